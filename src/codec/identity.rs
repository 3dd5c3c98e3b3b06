use crate::error::{CodecError, Result};
use crate::node::{KeyPredicates, PathArgument};
use crate::qname::QName;
use crate::value::{InstanceIdentifier, Value};

use super::{NamespaceContext, PrefixResolver, mismatch};

#[derive(Debug, Clone)]
pub(super) struct IdentityRefCodec {
    identities: Vec<QName>,
}

impl IdentityRefCodec {
    pub(super) fn new(identities: Vec<QName>) -> Self {
        Self { identities }
    }

    pub(super) fn serialize(&self, value: &Value, prefixes: &mut dyn PrefixResolver) -> Result<String> {
        let Value::IdentityRef(identity) = value else {
            return Err(mismatch("identityref", value));
        };
        self.check(identity)?;
        qualified(identity, prefixes)
    }

    pub(super) fn deserialize(&self, text: &str, namespaces: &dyn NamespaceContext) -> Result<Value> {
        let identity = resolve_qualified(text, namespaces)?;
        self.check(&identity)?;
        Ok(Value::IdentityRef(identity))
    }

    fn check(&self, identity: &QName) -> Result<()> {
        if self.identities.contains(identity) {
            return Ok(());
        }
        let allowed: Vec<String> = self.identities.iter().map(ToString::to_string).collect();
        Err(CodecError::invalid_argument(format!(
            "Identity {} is not one of the identities allowed here: [{}]",
            identity,
            allowed.join(", ")
        )))
    }
}

#[derive(Debug, Clone)]
pub(super) struct InstanceIdentifierCodec;

impl InstanceIdentifierCodec {
    pub(super) fn serialize(&self, value: &Value, prefixes: &mut dyn PrefixResolver) -> Result<String> {
        let Value::InstanceIdentifier(id) = value else {
            return Err(mismatch("instance-identifier", value));
        };
        if id.is_empty() {
            return Err(CodecError::invalid_argument(
                "An instance-identifier needs at least one step",
            ));
        }
        let mut out = String::new();
        for step in id.steps() {
            let qname = step.node_type().ok_or_else(|| {
                CodecError::invalid_argument(format!(
                    "{} cannot appear in an instance-identifier",
                    step
                ))
            })?;
            out.push('/');
            out.push_str(&qualified(qname, prefixes)?);
            match step {
                PathArgument::NodeIdentifierWithPredicates(_, keys) => {
                    for (key, key_value) in keys.iter() {
                        out.push('[');
                        out.push_str(&qualified(key, prefixes)?);
                        out.push('=');
                        out.push_str(&quote(&key_value.to_string())?);
                        out.push(']');
                    }
                }
                PathArgument::NodeWithValue(_, entry) => {
                    out.push_str("[.=");
                    out.push_str(&quote(&entry.to_string())?);
                    out.push(']');
                }
                _ => {}
            }
        }
        Ok(out)
    }

    pub(super) fn deserialize(&self, text: &str, namespaces: &dyn NamespaceContext) -> Result<Value> {
        let mut scanner = Scanner::new(text);
        let mut steps = Vec::new();
        while !scanner.at_end() {
            scanner.expect('/')?;
            let name = scanner.take_while(|c| c != '/' && c != '[' && !c.is_whitespace());
            if name.is_empty() {
                return Err(scanner.error("expected a node name"));
            }
            let qname = resolve_qualified(name, namespaces)?;

            let mut keys = KeyPredicates::new();
            let mut entry = None;
            while scanner.peek() == Some('[') {
                scanner.bump();
                scanner.skip_whitespace();
                if scanner.peek() == Some('.') {
                    scanner.bump();
                    scanner.skip_whitespace();
                    scanner.expect('=')?;
                    scanner.skip_whitespace();
                    entry = Some(Value::String(scanner.quoted()?));
                } else if scanner.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(scanner.error("positional predicates are not supported"));
                } else {
                    let key = scanner.take_while(|c| c != '=' && c != ']' && !c.is_whitespace());
                    if key.is_empty() {
                        return Err(scanner.error("expected a key name"));
                    }
                    let key = resolve_qualified(key, namespaces)?;
                    scanner.skip_whitespace();
                    scanner.expect('=')?;
                    scanner.skip_whitespace();
                    keys.insert(key, Value::String(scanner.quoted()?));
                }
                scanner.skip_whitespace();
                scanner.expect(']')?;
            }

            steps.push(match entry {
                Some(value) => PathArgument::NodeWithValue(qname, value),
                None if !keys.is_empty() => PathArgument::NodeIdentifierWithPredicates(qname, keys),
                None => PathArgument::NodeIdentifier(qname),
            });
        }
        if steps.is_empty() {
            return Err(CodecError::invalid_argument(
                "Empty string is not a valid instance-identifier",
            ));
        }
        Ok(Value::InstanceIdentifier(InstanceIdentifier::new(steps)))
    }
}

fn qualified(qname: &QName, prefixes: &mut dyn PrefixResolver) -> Result<String> {
    let prefix = prefixes.prefix_for(qname.namespace())?;
    Ok(format!("{}:{}", prefix, qname.local_name()))
}

/// Resolve `prefix:local` (or bare `local` in the default namespace)
fn resolve_qualified(text: &str, namespaces: &dyn NamespaceContext) -> Result<QName> {
    let (prefix, local) = match text.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, text),
    };
    if local.is_empty() || prefix == Some("") {
        return Err(CodecError::invalid_argument(format!(
            "'{}' is not a valid qualified name",
            text
        )));
    }
    let namespace = namespaces.namespace_for_prefix(prefix).ok_or_else(|| match prefix {
        Some(prefix) => CodecError::invalid_argument(format!(
            "Prefix '{}' in '{}' is not bound to a namespace",
            prefix, text
        )),
        None => CodecError::invalid_argument(format!(
            "'{}' has no prefix and no default namespace is in scope",
            text
        )),
    })?;
    Ok(QName::new(namespace, local))
}

fn quote(value: &str) -> Result<String> {
    if !value.contains('\'') {
        Ok(format!("'{}'", value))
    } else if !value.contains('"') {
        Ok(format!("\"{}\"", value))
    } else {
        Err(CodecError::invalid_argument(format!(
            "Predicate value {} contains both quote characters",
            value
        )))
    }
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.text[start..self.pos]
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Err(self.error("expected a quoted value")),
        };
        self.bump();
        let value = self.take_while(|c| c != quote);
        if self.at_end() {
            return Err(self.error("unterminated quoted value"));
        }
        self.bump();
        Ok(value.to_string())
    }

    fn error(&self, what: &str) -> CodecError {
        CodecError::invalid_argument(format!(
            "Invalid instance-identifier '{}' at offset {}: {}",
            self.text, self.pos, what
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ModulePrefixes;
    use crate::schema::{Module, SchemaContext};

    fn prefixes() -> ModulePrefixes {
        ModulePrefixes::from_context(&SchemaContext::new(
            vec![
                Module::new("foo", "urn:foo", "foo"),
                Module::new("bar", "urn:bar", "bar"),
            ],
            vec![],
        ))
    }

    struct Prefixes<'a>(&'a ModulePrefixes);

    impl PrefixResolver for Prefixes<'_> {
        fn prefix_for(&mut self, namespace: &str) -> Result<String> {
            Ok(self.0.prefix_of(namespace).unwrap_or("x").to_string())
        }
    }

    #[test]
    fn test_identityref_resolves_prefix() {
        let codec = IdentityRefCodec::new(vec![QName::new("urn:bar", "ethernet")]);
        let table = prefixes();
        let value = codec.deserialize("bar:ethernet", &table).unwrap();
        assert_eq!(value, Value::IdentityRef(QName::new("urn:bar", "ethernet")));
        assert_eq!(codec.serialize(&value, &mut Prefixes(&table)).unwrap(), "bar:ethernet");

        assert!(codec.deserialize("foo:ethernet", &table).is_err());
        assert!(codec.deserialize("baz:ethernet", &table).is_err());
        assert!(codec.deserialize("ethernet", &table).is_err());
    }

    #[test]
    fn test_instance_identifier_round_trip() {
        let codec = InstanceIdentifierCodec;
        let table = prefixes();
        let text = "/foo:users/foo:user[foo:name='Bob']/bar:tags[.=\"it's\"]";
        let value = codec.deserialize(text, &table).unwrap();
        let Value::InstanceIdentifier(id) = &value else {
            panic!("expected instance-identifier");
        };
        assert_eq!(id.steps().len(), 3);
        assert_eq!(
            id.steps()[1],
            PathArgument::NodeIdentifierWithPredicates(
                QName::new("urn:foo", "user"),
                KeyPredicates::new().with(QName::new("urn:foo", "name"), "Bob"),
            )
        );
        assert_eq!(codec.serialize(&value, &mut Prefixes(&table)).unwrap(), text);
    }

    #[test]
    fn test_instance_identifier_canonical_quotes() {
        let codec = InstanceIdentifierCodec;
        let table = prefixes();
        let value = codec
            .deserialize("/foo:user[ foo:name = \"Bob\" ]", &table)
            .unwrap();
        assert_eq!(
            codec.serialize(&value, &mut Prefixes(&table)).unwrap(),
            "/foo:user[foo:name='Bob']"
        );
    }

    #[test]
    fn test_instance_identifier_errors() {
        let codec = InstanceIdentifierCodec;
        let table = prefixes();
        for text in ["", "foo:a", "/", "/foo:a[", "/foo:a[foo:k='v'", "/foo:a[1]", "/nope:a"] {
            assert!(codec.deserialize(text, &table).is_err(), "{text:?}");
        }
    }
}
