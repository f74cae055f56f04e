//! ---
//! km_section: "04-policy-compilation"
//! km_subsection: "module"
//! km_type: "source"
//! km_scope: "code"
//! km_description: "Compiled dds artifact documents."
//! km_version: "v0.0.0-prealpha"
//! km_owner: "tbd"
//! ---
//! Compiled artifact documents rooted at `dds`.

use keymint_xml::{Element, XmlResult};

/// Root tag shared by all compiled artifacts.
pub const DDS_ROOT: &str = "dds";

macro_rules! artifact_document {
    ($(#[$meta:meta])* $name:ident, $section:literal, $entry:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            root: Element,
        }

        impl $name {
            /// Tag of the element nested directly under `dds`.
            pub const SECTION: &'static str = $section;

            /// Wrap already compiled entries, e.g. when joining the
            /// output of several fragments.
            pub fn from_entries(entries: Vec<Element>) -> Self {
                let section = Element::new($section).with_children(entries);
                Self {
                    root: Element::new(DDS_ROOT).with_child(section),
                }
            }

            /// The full `dds` tree.
            pub fn root(&self) -> &Element {
                &self.root
            }

            pub fn into_element(self) -> Element {
                self.root
            }

            /// Top-level entries in document order.
            pub fn entries(&self) -> impl Iterator<Item = &Element> + '_ {
                self.root
                    .find($section)
                    .into_iter()
                    .flat_map(|section| section.find_all($entry))
            }

            /// Render as tidied, indented, newline-terminated UTF-8 XML.
            pub fn to_xml(&self) -> XmlResult<String> {
                self.root.clone().tidy().to_xml_document()
            }
        }
    };
}

artifact_document!(
    /// `dds > permissions > grant*`.
    PermissionsDocument,
    "permissions",
    "grant"
);

artifact_document!(
    /// `dds > domain_access_rules > domain_rule*`.
    GovernanceDocument,
    "domain_access_rules",
    "domain_rule"
);
