//! Identity uniqueness

use fragsync::{CreateAssociation, FragmentDocument, Guid};
use proptest::prelude::*;
use std::collections::HashSet;

/// A thousand phantom creations in one document never collide
#[test]
fn test_phantom_identities_are_distinct() {
    let mut doc = FragmentDocument::default();
    let mut seen = HashSet::new();
    for i in 0..1000 {
        let guid = doc
            .create_association(CreateAssociation::Phantom {
                display_text: format!("note {}", i),
            })
            .unwrap();
        assert!(seen.insert(guid), "duplicate identity {}", guid);
    }
    assert_eq!(doc.list_associations().len(), 1000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Identities survive their textual form
    #[test]
    fn guid_text_round_trip(_seed in any::<u8>()) {
        let guid = Guid::generate();
        let parsed: Guid = guid.to_string().parse().unwrap();
        prop_assert_eq!(parsed, guid);
    }

    /// Creation order is list order, whatever the display texts are
    #[test]
    fn creation_order_is_list_order(texts in prop::collection::vec("[a-zA-Z0-9 ]{1,16}", 1..32)) {
        let mut doc = FragmentDocument::default();
        let mut created = Vec::new();
        for text in &texts {
            created.push(
                doc.create_association(CreateAssociation::Phantom {
                    display_text: text.clone(),
                })
                .unwrap(),
            );
        }
        prop_assert_eq!(doc.list_associations(), created);
    }
}
