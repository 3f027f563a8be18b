//! Attribute values survive serialization

use fragsync::{CreateAssociation, FragmentDocument, Namespace, Scope};
use proptest::prelude::*;

const APP: &str = "urn:example:app";

fn attribute_name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,10}".prop_filter("reserved", |name| name != "xmlns")
}

fn attribute_value() -> impl Strategy<Value = String> {
    "[ -~\t\n\u{e9}\u{4e2d}]{0,24}"
}

#[test]
fn test_attribute_round_trip_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::btree_map(attribute_name(), attribute_value(), 0..8),
                attribute_value(),
            ),
            |(attributes, data)| {
                let mut doc = FragmentDocument::default();
                let guid = doc
                    .create_association(CreateAssociation::NewItem {
                        display_text: "item".to_string(),
                        item_name: "item".to_string(),
                    })
                    .unwrap();
                let app = Namespace::uri(APP);
                for (name, value) in &attributes {
                    doc.set_attribute(Scope::Association(guid), &app, name, value)
                        .unwrap();
                    doc.set_attribute(Scope::Fragment, &app, name, value).unwrap();
                }
                doc.set_namespace_data(Scope::Association(guid), APP, &data)
                    .unwrap();

                let reread = FragmentDocument::from_text(&doc.to_text().unwrap()).unwrap();
                prop_assert_eq!(reread.list_associations(), doc.list_associations());
                prop_assert_eq!(reread.attributes(), doc.attributes());
                prop_assert_eq!(
                    reread.association(guid).unwrap().attributes(),
                    doc.association(guid).unwrap().attributes()
                );
                Ok(())
            },
        )
        .unwrap();
}
