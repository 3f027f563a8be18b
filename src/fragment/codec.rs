//! XML codec for fragment documents.
//!
//! Reading goes through `roxmltree`, which keeps byte ranges for every node so
//! that elements the model does not own can be carried as their original text.
//! Writing goes through `quick-xml`.
//!
//! Layout:
//!
//! ```text
//! <fragment xmlns="urn:fragsync:fragment" schemaVersion=".." ... writeGeneration="..">
//!   <ns0:namespaceData xmlns:ns0="urn:app" key="value">opaque</ns0:namespaceData>
//!   <association guid=".." displayText=".." ... isGroupingItem="false">
//!     <ns0:namespaceData xmlns:ns0="urn:app" key="value">opaque</ns0:namespaceData>
//!   </association>
//! </fragment>
//! ```

use crate::error::FragmentError;
use crate::fragment::association::AssociationRecord;
use crate::fragment::attributes::{validate_name, AttributeStore, NamespacePartition};
use crate::fragment::FragmentDocument;
use crate::types::Namespace;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use roxmltree::Node;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// XML namespace of the fragment schema
pub const FRAGMENT_NAMESPACE: &str = "urn:fragsync:fragment";

/// Schema version written into new documents
pub const SCHEMA_VERSION: &str = "1.0";

/// Namespace bound to the reserved `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of `xmlns` declarations themselves
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Well-known name of the fragment file inside a described folder
pub const DEFAULT_FRAGMENT_FILENAME: &str = ".fragment.xml";

pub(crate) const FRAGMENT_ELEMENT: &str = "fragment";
pub(crate) const ASSOCIATION_ELEMENT: &str = "association";
pub(crate) const NAMESPACE_DATA_ELEMENT: &str = "namespaceData";

/// Common attribute names
pub mod attr {
    pub const SCHEMA_VERSION: &str = "schemaVersion";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const ITEM_DESCRIBED: &str = "itemDescribed";
    pub const ITEM_DRIVER: &str = "itemDriver";
    pub const SYNC_DRIVER: &str = "syncDriver";
    pub const STORAGE_DRIVER: &str = "storageDriver";
    pub const WRITE_GENERATION: &str = "writeGeneration";

    pub const GUID: &str = "guid";
    pub const DISPLAY_TEXT: &str = "displayText";
    pub const ASSOCIATED_FRAGMENT: &str = "associatedFragment";
    pub const ASSOCIATED_STORAGE_DRIVER: &str = "associatedStorageDriver";
    pub const ASSOCIATED_ITEM: &str = "associatedItem";
    pub const LOCAL_ITEM: &str = "localItem";
    pub const IS_GROUPING_ITEM: &str = "isGroupingItem";

    /// Emission order for the fragment element
    pub const FRAGMENT_ORDER: [&str; 7] = [
        SCHEMA_VERSION,
        SCHEMA_LOCATION,
        ITEM_DESCRIBED,
        ITEM_DRIVER,
        SYNC_DRIVER,
        STORAGE_DRIVER,
        WRITE_GENERATION,
    ];

    /// Emission order for association elements (after `guid`)
    pub const ASSOCIATION_ORDER: [&str; 6] = [
        DISPLAY_TEXT,
        ASSOCIATED_FRAGMENT,
        ASSOCIATED_STORAGE_DRIVER,
        ASSOCIATED_ITEM,
        LOCAL_ITEM,
        IS_GROUPING_ITEM,
    ];
}

/// An element the model does not own, kept as its original source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueElement {
    raw: String,
}

impl OpaqueElement {
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Contents of a fragment or association element after classification
pub(crate) struct OwnerContents<'a, 'input> {
    pub attributes: AttributeStore,
    pub extensions: Vec<OpaqueElement>,
    pub associations: Vec<Node<'a, 'input>>,
}

/// Shared parse state for one document
pub(crate) struct ParseContext<'t> {
    pub text: &'t str,
    pub doc_namespace: Option<String>,
    /// Prefixed declarations the opaque elements rely on
    pub declarations: BTreeMap<String, String>,
}

impl<'t> ParseContext<'t> {
    fn is_schema_namespace(&self, namespace: Option<&str>) -> bool {
        namespace == self.doc_namespace.as_deref()
    }

    /// Capture an element verbatim. Prefixes it inherits from its ancestors
    /// are re-declared on the root, or on the element itself when the root
    /// already binds that prefix to another URI.
    fn keep_opaque(&mut self, node: Node<'_, '_>) -> OpaqueElement {
        let mut raw = self.text[node.range()].to_string();
        let parent = node.parent_element();
        for ns in node.namespaces() {
            let prefix = match ns.name() {
                Some(prefix) if prefix != "xml" => prefix,
                _ => continue,
            };
            let inherited = parent
                .and_then(|p| p.lookup_namespace_uri(Some(prefix)))
                .map_or(false, |uri| uri == ns.uri());
            if !inherited {
                // Declared on the element, so already part of its text
                continue;
            }
            match self.declarations.get(prefix) {
                Some(uri) if uri == ns.uri() => {}
                Some(_) => raw = declare_on_element(&raw, prefix, ns.uri()),
                None => {
                    self.declarations
                        .insert(prefix.to_string(), ns.uri().to_string());
                }
            }
        }
        OpaqueElement { raw }
    }
}

/// Insert `xmlns:prefix="uri"` right after the element name of a start tag
fn declare_on_element(raw: &str, prefix: &str, uri: &str) -> String {
    let name_end = raw
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_whitespace() || *c == '/' || *c == '>')
        .map_or(raw.len(), |(index, _)| index);
    format!(
        "{} xmlns:{}=\"{}\"{}",
        &raw[..name_end],
        prefix,
        quick_xml::escape::escape(uri),
        &raw[name_end..]
    )
}

/// Parse a fragment document from text
pub(crate) fn read_fragment(text: &str) -> Result<FragmentDocument, FragmentError> {
    let xml = roxmltree::Document::parse(text)?;
    let root = xml.root_element();
    let namespace = root.tag_name().namespace();
    if root.tag_name().name() != FRAGMENT_ELEMENT
        || !(namespace.is_none() || namespace == Some(FRAGMENT_NAMESPACE))
    {
        return Err(FragmentError::Parse(format!(
            "root element is <{}>, expected <{}> in {}",
            root.tag_name().name(),
            FRAGMENT_ELEMENT,
            FRAGMENT_NAMESPACE
        )));
    }

    let mut ctx = ParseContext {
        text,
        doc_namespace: namespace.map(str::to_string),
        declarations: BTreeMap::new(),
    };

    let contents = read_owner(root, &mut ctx, true)?;
    let mut associations = Vec::with_capacity(contents.associations.len());
    let mut seen = BTreeSet::new();
    for node in contents.associations {
        let record = AssociationRecord::from_element(node, &mut ctx)?;
        if !seen.insert(record.guid()) {
            return Err(FragmentError::InvalidType(format!(
                "association guid {} appears more than once",
                record.guid()
            )));
        }
        associations.push(record);
    }

    Ok(FragmentDocument::from_parts(
        contents.attributes,
        associations,
        contents.extensions,
        ctx.declarations,
    ))
}

/// Split an element into common attributes, namespace partitions, extensions
/// and (for the fragment element) association children.
pub(crate) fn read_owner<'a, 'input>(
    node: Node<'a, 'input>,
    ctx: &mut ParseContext<'_>,
    allow_associations: bool,
) -> Result<OwnerContents<'a, 'input>, FragmentError> {
    let mut attributes = AttributeStore::new();
    let mut namespaced = Vec::new();

    for attribute in node.attributes() {
        match attribute.namespace() {
            Some(XML_NAMESPACE) => {
                attributes.set_common_value(&format!("xml:{}", attribute.name()), attribute.value())
            }
            Some(uri) if uri != FRAGMENT_NAMESPACE => {
                namespaced.push((uri, attribute.name(), attribute.value()))
            }
            _ => attributes.set_common_value(attribute.name(), attribute.value()),
        }
    }

    let mut extensions = Vec::new();
    let mut associations = Vec::new();

    for child in node.children().filter(|c| c.is_element()) {
        let tag = child.tag_name();
        if allow_associations
            && tag.name() == ASSOCIATION_ELEMENT
            && ctx.is_schema_namespace(tag.namespace())
        {
            associations.push(child);
            continue;
        }
        match read_namespace_data(child, ctx) {
            Some((uri, partition)) if !attributes.has_namespace(&uri).unwrap_or(true) => {
                attributes.insert_partition(uri, partition);
            }
            _ => extensions.push(ctx.keep_opaque(child)),
        }
    }

    // A namespaced attribute on the element belongs to that namespace's partition
    for (uri, name, value) in namespaced {
        attributes.set(&Namespace::uri(uri), name, value)?;
    }

    Ok(OwnerContents {
        attributes,
        extensions,
        associations,
    })
}

/// Recognise a namespace data element. Anything with structure the model
/// cannot represent exactly is left to the opaque path.
fn read_namespace_data(node: Node<'_, '_>, ctx: &ParseContext<'_>) -> Option<(String, NamespacePartition)> {
    let tag = node.tag_name();
    let uri = tag.namespace()?;
    if tag.name() != NAMESPACE_DATA_ELEMENT
        || uri == FRAGMENT_NAMESPACE
        || uri == XML_NAMESPACE
        || ctx.is_schema_namespace(Some(uri))
    {
        return None;
    }

    let mut attributes = BTreeMap::new();
    for attribute in node.attributes() {
        if attribute.namespace().is_some() || validate_name(attribute.name()).is_err() {
            return None;
        }
        attributes.insert(attribute.name().to_string(), attribute.value().to_string());
    }

    let mut data = String::new();
    for child in node.children() {
        if !child.is_text() {
            return None;
        }
        data.push_str(child.text().unwrap_or_default());
    }

    Some((uri.to_string(), NamespacePartition::with_contents(attributes, data)))
}

type XmlWriter = Writer<Vec<u8>>;

/// Serialize a fragment document to text
pub(crate) fn write_fragment(doc: &FragmentDocument) -> Result<String, FragmentError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut root = BytesStart::new(FRAGMENT_ELEMENT);
    root.push_attribute(escaped_attribute("xmlns", FRAGMENT_NAMESPACE));
    for (prefix, uri) in doc.declarations() {
        let key = format!("xmlns:{}", prefix);
        root.push_attribute(escaped_attribute(&key, uri));
    }
    push_common(&mut root, doc.attributes(), &attr::FRAGMENT_ORDER);
    emit(&mut writer, Event::Start(root))?;

    write_partitions(&mut writer, doc.attributes())?;
    for association in doc.associations() {
        write_association(&mut writer, association)?;
    }
    write_extensions(&mut writer, doc.extensions())?;

    emit(&mut writer, Event::End(BytesEnd::new(FRAGMENT_ELEMENT)))?;

    let mut text = String::from_utf8(writer.into_inner())
        .map_err(|e| FragmentError::Serialization(e.to_string()))?;
    text.push('\n');
    Ok(text)
}

fn write_association(writer: &mut XmlWriter, record: &AssociationRecord) -> Result<(), FragmentError> {
    let mut element = BytesStart::new(ASSOCIATION_ELEMENT);
    let guid = record.guid().to_string();
    element.push_attribute(escaped_attribute(attr::GUID, &guid));
    push_common(&mut element, record.attributes(), &attr::ASSOCIATION_ORDER);

    if record.attributes().namespaces().next().is_none() && record.extensions().is_empty() {
        return emit(writer, Event::Empty(element));
    }

    emit(writer, Event::Start(element))?;
    write_partitions(writer, record.attributes())?;
    write_extensions(writer, record.extensions())?;
    emit(writer, Event::End(BytesEnd::new(ASSOCIATION_ELEMENT)))
}

/// Known attributes in schema order, then anything else in name order
fn push_common(element: &mut BytesStart<'_>, attributes: &AttributeStore, order: &[&str]) {
    for name in order {
        if let Some(value) = attributes.common_value(name) {
            element.push_attribute(escaped_attribute(name, value));
        }
    }
    for (name, value) in attributes.common() {
        if !order.contains(&name.as_str()) && name != attr::GUID {
            element.push_attribute(escaped_attribute(name, value));
        }
    }
}

fn write_partitions(writer: &mut XmlWriter, attributes: &AttributeStore) -> Result<(), FragmentError> {
    for (index, (uri, partition)) in attributes.namespaces().enumerate() {
        let prefix = format!("ns{}", index);
        let name = format!("{}:{}", prefix, NAMESPACE_DATA_ELEMENT);
        let mut element = BytesStart::new(name.as_str());
        element.push_attribute(escaped_attribute(&format!("xmlns:{}", prefix), uri));
        for (key, value) in partition.attributes() {
            element.push_attribute(escaped_attribute(key, value));
        }

        if partition.data().is_empty() {
            emit(writer, Event::Empty(element))?;
        } else {
            emit(writer, Event::Start(element))?;
            emit(
                writer,
                Event::Text(BytesText::from_escaped(escape_text(partition.data()))),
            )?;
            emit(writer, Event::End(BytesEnd::new(name.as_str())))?;
        }
    }
    Ok(())
}

fn write_extensions(writer: &mut XmlWriter, extensions: &[OpaqueElement]) -> Result<(), FragmentError> {
    for extension in extensions {
        emit(
            writer,
            Event::Text(BytesText::from_escaped(extension.raw.as_str())),
        )?;
    }
    Ok(())
}

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), FragmentError> {
    writer
        .write_event(event)
        .map_err(|e| FragmentError::Serialization(e.to_string()))
}

/// Attribute value escaping that survives attribute-value normalization
fn escaped_attribute<'a>(key: &'a str, value: &str) -> Attribute<'a> {
    let escaped = quick_xml::escape::escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;");
    Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    }
}

fn escape_text(value: &str) -> String {
    quick_xml::escape::escape(value).replace('\r', "&#13;")
}
