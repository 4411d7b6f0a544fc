use serde::Serialize;

/// A template compiled into the binary. Used when `templates_dir` has no
/// file of the same name.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BundledTemplate {
    pub name: &'static str,
    pub file: &'static str,
    pub source: &'static str,
}

pub const BUNDLED_TEMPLATES: &[BundledTemplate] = &[
    BundledTemplate {
        name: "malware-lab",
        file: "malware-lab.yml",
        source: include_str!("../../../templates/malware-lab.yml"),
    },
    BundledTemplate {
        name: "web-pentest",
        file: "web-pentest.yml",
        source: include_str!("../../../templates/web-pentest.yml"),
    },
    BundledTemplate {
        name: "windows-ad",
        file: "windows-ad.yml",
        source: include_str!("../../../templates/windows-ad.yml"),
    },
];

pub fn get_bundled(name: &str) -> Option<&'static BundledTemplate> {
    BUNDLED_TEMPLATES.iter().find(|t| t.name == name)
}
