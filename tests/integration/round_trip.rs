//! Fragment text round trips, including payloads the model does not understand

use fragsync::fragment::{FragmentDocument, FRAGMENT_NAMESPACE};
use fragsync::{CreateAssociation, FragmentError, Guid, Namespace, Scope};

const APP: &str = "urn:example:app";

const FOREIGN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fragment xmlns="urn:fragsync:fragment" xmlns:x="urn:vendor:x"
          schemaVersion="1.0" itemDescribed="." itemDriver="local"
          writeGeneration="0b6b5a9e-6a4f-4c1e-9d5b-3a1f2e4d5c6b">
  <x:thumbnail size="64">AAAA<x:inner kind="raw"/></x:thumbnail>
  <ns0:namespaceData xmlns:ns0="urn:example:app" color="red">payload</ns0:namespaceData>
  <association guid="9f8b1c2e-4a5d-4e6f-8a7b-1c2d3e4f5a6b" displayText="a.txt"
               associatedItem="a.txt" localItem="a.txt" isGroupingItem="false">
    <x:tag>keep &amp; me</x:tag>
  </association>
</fragment>
"#;

fn association_guid() -> Guid {
    Guid::parse("9f8b1c2e-4a5d-4e6f-8a7b-1c2d3e4f5a6b").unwrap()
}

#[test]
fn test_foreign_document_is_understood() {
    let doc = FragmentDocument::from_text(FOREIGN).unwrap();

    assert_eq!(doc.item_driver(), Some("local"));
    assert_eq!(doc.list_associations(), vec![association_guid()]);
    assert_eq!(
        doc.get_attribute(Scope::Fragment, &Namespace::uri(APP), "color")
            .unwrap()
            .as_deref(),
        Some("red")
    );
    assert_eq!(doc.namespace_data(Scope::Fragment, APP).unwrap(), Some("payload"));

    assert_eq!(doc.extensions().len(), 1);
    assert_eq!(
        doc.extensions()[0].raw(),
        r#"<x:thumbnail size="64">AAAA<x:inner kind="raw"/></x:thumbnail>"#
    );
    let record = doc.association(association_guid()).unwrap();
    assert_eq!(record.extensions()[0].raw(), "<x:tag>keep &amp; me</x:tag>");
}

#[test]
fn test_foreign_payloads_survive_round_trip() {
    let doc = FragmentDocument::from_text(FOREIGN).unwrap();
    let text = doc.to_text().unwrap();
    assert!(text.contains(r#"xmlns:x="urn:vendor:x""#));
    assert!(text.contains(&format!(r#"xmlns="{}""#, FRAGMENT_NAMESPACE)));

    let reread = FragmentDocument::from_text(&text).unwrap();
    assert_eq!(reread.list_associations(), doc.list_associations());
    assert_eq!(reread.attributes(), doc.attributes());
    assert_eq!(reread.extensions(), doc.extensions());
    let before = doc.association(association_guid()).unwrap();
    let after = reread.association(association_guid()).unwrap();
    assert_eq!(after.attributes(), before.attributes());
    assert_eq!(after.extensions(), before.extensions());

    // A second pass is stable
    assert_eq!(reread.to_text().unwrap(), text);
}

#[test]
fn test_built_document_round_trips() {
    let mut doc = FragmentDocument::default();
    let note = doc
        .create_association(CreateAssociation::Phantom {
            display_text: "Quarterly <notes> & \"quotes\"".to_string(),
        })
        .unwrap();
    let dir = doc
        .create_association(CreateAssociation::NewGroupingItem {
            display_text: "Photos".to_string(),
            item_name: "photos".to_string(),
        })
        .unwrap();
    let app = Namespace::uri(APP);
    doc.set_attribute(Scope::Association(dir), &app, "sort", "date\ttaken")
        .unwrap();
    doc.set_namespace_data(Scope::Association(dir), APP, "line one\nline two")
        .unwrap();
    doc.set_attribute(Scope::Fragment, &Namespace::Common, "owner", "team")
        .unwrap();

    let reread = FragmentDocument::from_text(&doc.to_text().unwrap()).unwrap();
    assert_eq!(reread.list_associations(), vec![note, dir]);
    assert_eq!(reread.attributes(), doc.attributes());
    assert_eq!(
        reread.association_display_text(note).unwrap(),
        Some("Quarterly <notes> & \"quotes\"")
    );
    assert_eq!(
        reread
            .get_attribute(Scope::Association(dir), &app, "sort")
            .unwrap()
            .as_deref(),
        Some("date\ttaken")
    );
    assert_eq!(
        reread.namespace_data(Scope::Association(dir), APP).unwrap(),
        Some("line one\nline two")
    );
    assert_eq!(
        reread.association_associated_fragment(dir).unwrap(),
        Some("photos/.fragment.xml")
    );
    assert!(reread.association_is_grouping_item(dir).unwrap());
}

#[test]
fn test_association_without_guid_is_rejected() {
    let text = r#"<fragment xmlns="urn:fragsync:fragment"><association displayText="x"/></fragment>"#;
    assert!(matches!(
        FragmentDocument::from_text(text).unwrap_err(),
        FragmentError::InvalidType(_)
    ));
}

#[test]
fn test_unqualified_document_is_accepted() {
    let text = r#"<fragment schemaVersion="1.0"><association guid="9f8b1c2e-4a5d-4e6f-8a7b-1c2d3e4f5a6b" localItem="b"/></fragment>"#;
    let doc = FragmentDocument::from_text(text).unwrap();
    assert_eq!(doc.find_by_local_item("b"), Some(association_guid()));
}

#[test]
fn test_duplicate_association_guids_are_rejected() {
    let text = r#"<fragment xmlns="urn:fragsync:fragment">
  <association guid="9f8b1c2e-4a5d-4e6f-8a7b-1c2d3e4f5a6b" localItem="a.txt"/>
  <association guid="9f8b1c2e-4a5d-4e6f-8a7b-1c2d3e4f5a6b" localItem="b.txt"/>
</fragment>"#;
    let err = FragmentDocument::from_text(text).unwrap_err();
    assert!(matches!(err, FragmentError::InvalidType(_)));
}

#[test]
fn test_xml_lang_stays_a_plain_attribute() {
    let text = r#"<fragment xmlns="urn:fragsync:fragment" xml:lang="en" itemDriver="local">
  <association guid="9f8b1c2e-4a5d-4e6f-8a7b-1c2d3e4f5a6b" xml:lang="fr" localItem="a.txt"/>
</fragment>"#;
    let doc = FragmentDocument::from_text(text).unwrap();
    assert!(doc.namespaces(Scope::Fragment).unwrap().is_empty());
    assert_eq!(
        doc.get_attribute(Scope::Fragment, &Namespace::Common, "xml:lang")
            .unwrap()
            .as_deref(),
        Some("en")
    );

    let written = doc.to_text().unwrap();
    let reread = FragmentDocument::from_text(&written).unwrap();
    assert!(reread.namespaces(Scope::Fragment).unwrap().is_empty());
    assert_eq!(
        reread
            .get_attribute(
                Scope::Association(association_guid()),
                &Namespace::Common,
                "xml:lang"
            )
            .unwrap()
            .as_deref(),
        Some("fr")
    );
    assert_eq!(reread.to_text().unwrap(), written);
}

#[test]
fn test_rebound_prefix_keeps_element_namespace() {
    let text = r#"<fragment xmlns="urn:fragsync:fragment" xmlns:a="urn:one">
  <a:x/>
  <association guid="9f8b1c2e-4a5d-4e6f-8a7b-1c2d3e4f5a6b" xmlns:a="urn:two">
    <a:y/>
  </association>
</fragment>"#;
    let doc = FragmentDocument::from_text(text).unwrap();
    let written = doc.to_text().unwrap();

    let xml = roxmltree::Document::parse(&written).unwrap();
    for (name, uri) in [("x", "urn:one"), ("y", "urn:two")] {
        let node = xml
            .descendants()
            .find(|n| n.tag_name().name() == name)
            .unwrap();
        assert_eq!(node.tag_name().namespace(), Some(uri), "{}", name);
    }
}
