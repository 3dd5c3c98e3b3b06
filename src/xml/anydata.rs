use crate::codec::CodecRegistry;
use crate::error::Result;
use crate::node::{AnydataNode, AnydataPayload, ContainerNode, NormalizedNode, PathArgument};
use crate::schema::{DataSchemaNode, SchemaContext, SchemaPath};

use super::{CapturedEventSource, CapturedSubtree, XmlParser};

/// Interprets captured anydata/anyxml content against a schema node.
///
/// The captured content is treated as the content of the target node: if it
/// consists of a single element named like the target, that element is
/// parsed directly, otherwise the content is parsed as the children of a
/// synthetic element named after the target. Empty content normalizes to an
/// empty container. The anydata node itself is never modified.
#[derive(Clone, Copy)]
pub struct AnydataNormalizer<'a> {
    parser: XmlParser<'a>,
}

impl<'a> AnydataNormalizer<'a> {
    pub fn new(context: &'a SchemaContext, codecs: &'a CodecRegistry) -> Self {
        Self::with_parser(XmlParser::new(context, codecs))
    }

    pub fn with_parser(parser: XmlParser<'a>) -> Self {
        Self { parser }
    }

    /// Normalized view of `node`; already normalized payloads are returned as-is
    pub fn normalize(&self, node: &AnydataNode, target: &DataSchemaNode) -> Result<NormalizedNode> {
        match &node.payload {
            AnydataPayload::Normalized(normalized) => Ok(normalized.as_ref().clone()),
            AnydataPayload::Opaque(captured) => self.normalize_captured(captured, target),
        }
    }

    pub fn normalize_captured(
        &self,
        captured: &CapturedSubtree,
        target: &DataSchemaNode,
    ) -> Result<NormalizedNode> {
        self.normalize_at(captured, target, &SchemaPath::root())
    }

    /// Normalize with `target` located under `base` in the schema tree
    pub(crate) fn normalize_at(
        &self,
        captured: &CapturedSubtree,
        target: &DataSchemaNode,
        base: &SchemaPath,
    ) -> Result<NormalizedNode> {
        let qname = target.qname();
        if captured.is_empty() {
            return Ok(ContainerNode::new(PathArgument::NodeIdentifier(qname.clone()), Vec::new()).into());
        }

        let mut elements = captured.elements();
        let single = match (elements.next(), elements.next()) {
            (Some(only), None) => only.matches(qname),
            _ => false,
        };
        if single {
            self.parser
                .parse_at(target, base, &mut CapturedEventSource::new(captured))
        } else {
            self.parser
                .parse_at(target, base, &mut CapturedEventSource::wrapped(qname, captured))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qname::QName;
    use crate::schema::{ContainerSchema, LeafSchema, Module, TypeDefinition};
    use crate::value::Value;
    use crate::xml::{EventSource, XmlReader};

    const NS: &str = "urn:test";

    fn q(local: &str) -> QName {
        QName::new(NS, local)
    }

    fn target() -> DataSchemaNode {
        DataSchemaNode::Container(ContainerSchema::new(
            q("payload"),
            vec![DataSchemaNode::Leaf(LeafSchema::new(q("count"), TypeDefinition::uint32()))],
        ))
    }

    fn capture(xml: &str) -> CapturedSubtree {
        let mut reader = XmlReader::from_str(xml);
        reader.next_event().unwrap();
        CapturedSubtree::capture(&mut reader).unwrap()
    }

    fn context() -> SchemaContext {
        SchemaContext::new(vec![Module::new("test", NS, "t")], vec![])
    }

    #[test]
    fn test_children_are_wrapped() {
        let ctx = context();
        let codecs = CodecRegistry::new(&ctx);
        let captured = capture(r#"<any xmlns="urn:test"><count>0x10</count></any>"#);
        let node = AnydataNormalizer::new(&ctx, &codecs)
            .normalize(&AnydataNode::opaque(q("any"), captured), &target())
            .unwrap();
        let payload = node.as_container().unwrap();
        assert_eq!(payload.qname(), Some(&q("payload")));
        assert_eq!(payload.leaf_value(&q("count")), Some(&Value::Uint32(16)));
    }

    #[test]
    fn test_single_matching_element_is_parsed_directly() {
        let ctx = context();
        let codecs = CodecRegistry::new(&ctx);
        let captured = capture(r#"<any xmlns="urn:test"><payload><count>3</count></payload></any>"#);
        let normalizer = AnydataNormalizer::new(&ctx, &codecs);
        let first = normalizer.normalize_captured(&captured, &target()).unwrap();
        let second = normalizer.normalize_captured(&captured, &target()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.as_container().unwrap().leaf_value(&q("count")),
            Some(&Value::Uint32(3))
        );
    }

    #[test]
    fn test_empty_content_is_empty_container() {
        let ctx = context();
        let codecs = CodecRegistry::new(&ctx);
        let node = AnydataNormalizer::new(&ctx, &codecs)
            .normalize_captured(&capture("<any> </any>"), &target())
            .unwrap();
        assert_eq!(
            node,
            ContainerNode::new(PathArgument::NodeIdentifier(q("payload")), vec![]).into()
        );
    }
}
