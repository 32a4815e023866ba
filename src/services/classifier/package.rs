//! Map an import target to the package that provides it.

use crate::domain::models::Language;

/// Python import names whose distribution is published under another name.
const PYTHON_ALIASES: &[(&str, &str)] = &[
    ("cv2", "opencv-python"),
    ("PIL", "Pillow"),
    ("sklearn", "scikit-learn"),
    ("yaml", "PyYAML"),
    ("bs4", "beautifulsoup4"),
    ("dotenv", "python-dotenv"),
    ("jwt", "PyJWT"),
    ("dateutil", "python-dateutil"),
    ("Crypto", "pycryptodome"),
    ("docx", "python-docx"),
    ("serial", "pyserial"),
    ("attr", "attrs"),
    ("magic", "python-magic"),
    ("psycopg2", "psycopg2-binary"),
    ("jose", "python-jose"),
    ("multipart", "python-multipart"),
];

const RUST_PATH_ROOTS: [&str; 6] = ["crate", "self", "super", "std", "core", "alloc"];

/// Installable package name for `module`, or `None` when the target is a
/// relative path, a builtin, or not something a package manager provides.
pub fn normalize_package(module: &str, language: Language) -> Option<String> {
    let module = module
        .trim()
        .trim_matches(|c| c == '\'' || c == '"' || c == '`');
    if module.is_empty() || module.starts_with('.') || module.starts_with('/') {
        return None;
    }

    let package = match language {
        lang if lang.is_node() || lang == Language::Solidity => node_package(module)?,
        Language::Python => python_package(module),
        Language::Ruby | Language::Dart => module.split('/').next()?.to_string(),
        Language::Rust => {
            let root = module.split("::").next()?;
            if RUST_PATH_ROOTS.contains(&root) {
                return None;
            }
            root.to_string()
        }
        Language::Go | Language::Php | Language::CSharp | Language::Java | Language::Cpp => {
            module.to_string()
        }
        Language::C | Language::Unknown => return None,
        _ => module.to_string(),
    };

    is_valid_package(&package).then_some(package)
}

fn node_package(module: &str) -> Option<String> {
    if module.starts_with("node:") {
        return None;
    }
    let mut parts = module.split('/');
    let first = parts.next()?;
    if first.starts_with('@') {
        let name = parts.next().filter(|n| !n.is_empty())?;
        Some(format!("{first}/{name}"))
    } else {
        Some(first.to_string())
    }
}

fn python_package(module: &str) -> String {
    let root = module.split('.').next().unwrap_or(module);
    PYTHON_ALIASES
        .iter()
        .find(|(import, _)| *import == root)
        .map_or_else(|| root.to_string(), |(_, dist)| (*dist).to_string())
}

fn is_valid_package(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '/' | '.' | '_' | '-' | ':'))
}

/// Install command for a single package in the given ecosystem.
pub fn install_command(package: &str, language: Language) -> Option<String> {
    language
        .install_prefix()
        .map(|prefix| format!("{prefix} {package}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_subpaths_collapse_to_the_package() {
        assert_eq!(
            normalize_package("lodash/fp", Language::JavaScript).as_deref(),
            Some("lodash")
        );
        assert_eq!(
            normalize_package("@scope/pkg/x", Language::TypeScript).as_deref(),
            Some("@scope/pkg")
        );
        assert_eq!(
            normalize_package("@openzeppelin/contracts/token/ERC20/ERC20.sol", Language::Solidity)
                .as_deref(),
            Some("@openzeppelin/contracts")
        );
        assert_eq!(normalize_package("./utils", Language::JavaScript), None);
        assert_eq!(normalize_package("node:fs", Language::JavaScript), None);
        assert_eq!(normalize_package("@scope", Language::JavaScript), None);
    }

    #[test]
    fn python_imports_map_to_distributions() {
        assert_eq!(
            normalize_package("cv2", Language::Python).as_deref(),
            Some("opencv-python")
        );
        assert_eq!(
            normalize_package("sklearn.linear_model", Language::Python).as_deref(),
            Some("scikit-learn")
        );
        assert_eq!(
            normalize_package("requests.adapters", Language::Python).as_deref(),
            Some("requests")
        );
    }

    #[test]
    fn rust_paths_skip_local_roots() {
        assert_eq!(normalize_package("crate", Language::Rust), None);
        assert_eq!(
            normalize_package("serde_json", Language::Rust).as_deref(),
            Some("serde_json")
        );
    }

    #[test]
    fn rejects_odd_names() {
        assert_eq!(normalize_package("foo bar", Language::JavaScript), None);
        assert_eq!(normalize_package("stdio.h", Language::C), None);
    }

    #[test]
    fn install_commands_follow_the_ecosystem() {
        assert_eq!(
            install_command("express", Language::JavaScript).as_deref(),
            Some("npm install express")
        );
        assert_eq!(
            install_command("requests", Language::Python).as_deref(),
            Some("pip install requests")
        );
        assert_eq!(install_command("junit", Language::Java), None);
    }
}
