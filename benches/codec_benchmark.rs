use divan::{Bencher, black_box};
use yang_xml_codec::codec::{Codec, CodecRegistry};
use yang_xml_codec::qname::QName;
use yang_xml_codec::schema::{
    ContainerSchema, DataSchemaNode, LeafListSchema, LeafSchema, ListSchema, Module,
    SchemaContext, TypeDefinition,
};
use yang_xml_codec::xml::{WriteOrdering, XmlParser, XmlTreeWriter};

fn main() {
    divan::main();
}

const NS: &str = "urn:bench";

fn q(local: &str) -> QName {
    QName::new(NS, local)
}

fn leaf(local: &str, type_def: TypeDefinition) -> DataSchemaNode {
    DataSchemaNode::Leaf(LeafSchema::new(q(local), type_def))
}

fn context() -> SchemaContext {
    let interface = ListSchema::new(
        q("interface"),
        vec![q("name")],
        vec![
            leaf("name", TypeDefinition::string()),
            leaf("mtu", TypeDefinition::uint16()),
            leaf("speed", TypeDefinition::decimal64(3)),
            leaf("flags", TypeDefinition::bits([("up", 0), ("running", 1), ("promisc", 2)])),
            DataSchemaNode::LeafList(LeafListSchema::new(q("address"), TypeDefinition::string())),
        ],
    );
    let interfaces = ContainerSchema::new(q("interfaces"), vec![DataSchemaNode::List(interface)]);
    SchemaContext::new(
        vec![Module::new("bench", NS, "b")],
        vec![DataSchemaNode::Container(interfaces)],
    )
}

fn document(entries: usize) -> String {
    let mut xml = format!(r#"<interfaces xmlns="{}">"#, NS);
    for i in 0..entries {
        xml.push_str(&format!(
            "<interface><name>eth{i}</name><mtu>1500</mtu><speed>{i}.125</speed>\
             <flags>running up</flags><address>10.0.0.{i}</address><address>fe80::{i}</address></interface>"
        ));
    }
    xml.push_str("</interfaces>");
    xml
}

#[divan::bench(args = ["1174404318", "0x45FFFCDE", "010577776336"])]
fn deserialize_int32(bencher: Bencher, text: &str) {
    let codec = Codec::for_type(&TypeDefinition::int32()).unwrap();
    bencher.bench_local(|| codec.deserialize(black_box(text)).unwrap());
}

#[divan::bench]
fn deserialize_decimal64(bencher: Bencher) {
    let codec = Codec::for_type(&TypeDefinition::decimal64(6)).unwrap();
    bencher.bench_local(|| codec.deserialize(black_box("-1234.5")).unwrap());
}

#[divan::bench]
fn deserialize_union(bencher: Bencher) {
    let codec = Codec::for_type(&TypeDefinition::union(vec![
        TypeDefinition::enumeration(["auto", "none"]),
        TypeDefinition::int32(),
        TypeDefinition::string(),
    ]))
    .unwrap();
    bencher.bench_local(|| codec.deserialize(black_box("12345")).unwrap());
}

#[divan::bench(args = [1, 100])]
fn parse_document(bencher: Bencher, entries: usize) {
    let ctx = context();
    let codecs = CodecRegistry::new(&ctx);
    let root = ctx.data_child(&q("interfaces")).unwrap();
    let xml = document(entries);

    bencher.bench_local(|| {
        XmlParser::new(&ctx, &codecs)
            .parse_str(black_box(&xml), root)
            .unwrap()
    });
}

#[divan::bench(args = [1, 100])]
fn write_document(bencher: Bencher, entries: usize) {
    let ctx = context();
    let codecs = CodecRegistry::new(&ctx);
    let root = ctx.data_child(&q("interfaces")).unwrap();
    let node = XmlParser::new(&ctx, &codecs)
        .parse_str(&document(entries), root)
        .unwrap();
    let writer = XmlTreeWriter::new(&ctx, &codecs).with_ordering(WriteOrdering::Schema);

    bencher.bench_local(|| writer.write_to_string(black_box(&node), root).unwrap());
}
