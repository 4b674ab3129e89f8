//! Bundled regex-based reference extractor
//!
//! A deliberately lightweight [`ReferenceProvider`] covering the common
//! import/export shapes of ES-module-style sources. Real deployments
//! wrap their symbol indexer instead; this extractor keeps the engine
//! usable (and testable) without one.

use crate::reference::{FileReferences, ReferenceError, ReferenceProvider};
use regex::Regex;
use std::path::Path;

/// Regex-backed reference extraction
///
/// Recognizes:
/// - `import { a, b } from "./x"` and `import x from "./x"`
/// - side-effect imports `import "./x"` and `require("./x")`
/// - `export function|class|const|let|interface|type NAME`
/// - re-export lists `export { a, b }`
#[derive(Debug)]
pub struct RegexReferenceExtractor {
    import_from: Regex,
    import_bare: Regex,
    require_call: Regex,
    export_decl: Regex,
    export_list: Regex,
    named_imports: Regex,
}

impl RegexReferenceExtractor {
    /// Build the extractor, compiling its patterns once
    #[must_use]
    pub fn new() -> Self {
        // Patterns are static and known-good; compilation cannot fail.
        Self {
            import_from: Regex::new(r#"import\s+(?:[\w$]+|\{[^}]*\}|\*\s+as\s+[\w$]+)(?:\s*,\s*(?:[\w$]+|\{[^}]*\}))?\s+from\s+['"]([^'"]+)['"]"#).unwrap(),
            import_bare: Regex::new(r#"import\s+['"]([^'"]+)['"]"#).unwrap(),
            require_call: Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
            export_decl: Regex::new(
                r"export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|let|var|interface|type|enum)\s+([\w$]+)",
            )
            .unwrap(),
            export_list: Regex::new(r"export\s*\{([^}]*)\}").unwrap(),
            named_imports: Regex::new(r"import\s*(?:[\w$]+\s*,\s*)?\{([^}]*)\}").unwrap(),
        }
    }
}

impl Default for RegexReferenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceProvider for RegexReferenceExtractor {
    fn references(&self, _path: &Path, content: &str) -> Result<FileReferences, ReferenceError> {
        let mut refs = FileReferences::empty();

        for caps in self.import_from.captures_iter(content) {
            refs.imports.insert(caps[1].into());
        }
        for caps in self.import_bare.captures_iter(content) {
            refs.imports.insert(caps[1].into());
        }
        for caps in self.require_call.captures_iter(content) {
            refs.imports.insert(caps[1].into());
        }
        for caps in self.export_decl.captures_iter(content) {
            refs.exported_symbols.insert(caps[1].to_string());
        }
        for caps in self.export_list.captures_iter(content) {
            for name in caps[1].split(',') {
                // `export { inner as outer }` exposes the outer name
                let name = name.split(" as ").last().unwrap_or(name).trim();
                if !name.is_empty() {
                    refs.exported_symbols.insert(name.to_string());
                }
            }
        }
        for caps in self.named_imports.captures_iter(content) {
            for name in caps[1].split(',') {
                let name = name.split(" as ").next().unwrap_or(name).trim();
                if !name.is_empty() {
                    refs.used_symbols.insert(name.to_string());
                }
            }
        }

        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str) -> FileReferences {
        RegexReferenceExtractor::new()
            .references(Path::new("test.ts"), content)
            .unwrap()
    }

    #[test]
    fn extract_named_import() {
        let refs = extract(r#"import { parse, render } from "./engine";"#);
        assert!(refs.imports.contains(Path::new("./engine")));
        assert!(refs.used_symbols.contains("parse"));
        assert!(refs.used_symbols.contains("render"));
    }

    #[test]
    fn extract_default_import() {
        let refs = extract(r#"import engine from "../core/engine";"#);
        assert!(refs.imports.contains(Path::new("../core/engine")));
    }

    #[test]
    fn extract_require() {
        let refs = extract(r#"const util = require("./util");"#);
        assert!(refs.imports.contains(Path::new("./util")));
    }

    #[test]
    fn extract_export_declarations() {
        let refs = extract("export function run() {}\nexport const LIMIT = 3;\nexport class Engine {}");
        assert!(refs.exported_symbols.contains("run"));
        assert!(refs.exported_symbols.contains("LIMIT"));
        assert!(refs.exported_symbols.contains("Engine"));
    }

    #[test]
    fn extract_export_list_with_alias() {
        let refs = extract("export { inner as outer, plain };");
        assert!(refs.exported_symbols.contains("outer"));
        assert!(refs.exported_symbols.contains("plain"));
        assert!(!refs.exported_symbols.contains("inner"));
    }

    #[test]
    fn extract_import_alias_uses_source_name() {
        let refs = extract(r#"import { original as alias } from "./m";"#);
        assert!(refs.used_symbols.contains("original"));
        assert!(!refs.used_symbols.contains("alias"));
    }

    #[test]
    fn extract_nothing_from_plain_code() {
        let refs = extract("const x = 1;\nfunction local() {}");
        assert!(refs.is_empty());
    }
}
