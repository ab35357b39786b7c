//! Function-level code extraction using tree-sitter
//!
//! Turns a source file into an ordered list of [`CodeUnit`]s. Languages
//! without a structural parser get a single whole-file unit instead.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

use super::metrics::{cyclomatic_complexity, parameter_count, LineMetrics};
use super::unit::CodeUnit;
use crate::error::ExtractionError;

/// Supported programming languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    #[serde(rename = "TSX")]
    Tsx,
    Go,
    Java,
    Kotlin,
    Swift,
    Ruby,
    #[serde(rename = "PHP")]
    Php,
    C,
    #[serde(rename = "C++")]
    Cpp,
    #[serde(rename = "C#")]
    CSharp,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "mts" | "cts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "go" => Language::Go,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" => Language::Cpp,
            "cs" => Language::CSharp,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Parse a language tag as produced by a language detector.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "rust" => Language::Rust,
            "python" => Language::Python,
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "go" => Language::Go,
            "java" => Language::Java,
            "kotlin" => Language::Kotlin,
            "swift" => Language::Swift,
            "ruby" => Language::Ruby,
            "php" => Language::Php,
            "c" => Language::C,
            "c++" | "cpp" => Language::Cpp,
            "c#" | "csharp" => Language::CSharp,
            _ => Language::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Rust => "Rust",
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Tsx => "TSX",
            Language::Go => "Go",
            Language::Java => "Java",
            Language::Kotlin => "Kotlin",
            Language::Swift => "Swift",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
            Language::Unknown => "Unknown",
        }
    }

    /// Whether function-level extraction is available for this language.
    pub fn has_structural_parser(&self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::Python
                | Language::JavaScript
                | Language::TypeScript
                | Language::Tsx
                | Language::Go
        )
    }

    fn scope_separator(&self) -> &'static str {
        match self {
            Language::Rust => "::",
            _ => ".",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything extracted from one file.
#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub file_path: String,
    pub language: Language,
    pub units: Vec<CodeUnit>,
    pub metrics: LineMetrics,
    /// True when the file was summarized as a single heuristic unit.
    pub heuristic: bool,
    source: String,
}

impl FileExtraction {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Units paired with the text each one is embedded from.
    pub fn units_with_text(&self) -> impl Iterator<Item = (&CodeUnit, String)> + '_ {
        self.units
            .iter()
            .map(move |unit| (unit, unit.embedding_text(&self.source)))
    }
}

/// Code parser using tree-sitter
pub struct CodeParser {
    rust_parser: Parser,
    python_parser: Parser,
    javascript_parser: Parser,
    typescript_parser: Parser,
    tsx_parser: Parser,
    go_parser: Parser,
}

impl CodeParser {
    /// Create a new code parser with all supported languages
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            rust_parser: parser_for(tree_sitter_rust::language(), Language::Rust)?,
            python_parser: parser_for(tree_sitter_python::language(), Language::Python)?,
            javascript_parser: parser_for(tree_sitter_javascript::language(), Language::JavaScript)?,
            typescript_parser: parser_for(
                tree_sitter_typescript::language_typescript(),
                Language::TypeScript,
            )?,
            tsx_parser: parser_for(tree_sitter_typescript::language_tsx(), Language::Tsx)?,
            go_parser: parser_for(tree_sitter_go::language(), Language::Go)?,
        })
    }

    /// Read `relative_path` under `root` and extract its units.
    pub fn extract_file(
        &mut self,
        root: &Path,
        relative_path: &str,
        language: Language,
        max_file_size_mb: u32,
    ) -> Result<FileExtraction, ExtractionError> {
        let full_path = root.join(relative_path);

        let size = std::fs::metadata(&full_path)
            .map_err(|source| ExtractionError::Read {
                path: full_path.clone(),
                source,
            })?
            .len();
        if size > u64::from(max_file_size_mb) * 1024 * 1024 {
            return Err(ExtractionError::TooLarge {
                path: full_path,
                limit_mb: max_file_size_mb,
            });
        }

        let source = std::fs::read_to_string(&full_path).map_err(|source| ExtractionError::Read {
            path: full_path.clone(),
            source,
        })?;

        self.extract_source(relative_path, &source, language)
    }

    /// Extract units from in-memory source text.
    pub fn extract_source(
        &mut self,
        file_path: &str,
        source: &str,
        language: Language,
    ) -> Result<FileExtraction, ExtractionError> {
        let metrics = LineMetrics::from_source(source);

        if !language.has_structural_parser() {
            return Ok(FileExtraction {
                file_path: file_path.to_string(),
                language,
                units: heuristic_unit(file_path, source, language, &metrics)
                    .into_iter()
                    .collect(),
                metrics,
                heuristic: true,
                source: source.to_string(),
            });
        }

        let tree = self.parse_content(file_path, source, language)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(ExtractionError::Syntax {
                path: file_path.into(),
                line: first_error_line(root).unwrap_or(1),
            });
        }

        let mut units = Vec::new();
        collect_units(root, file_path, source, language, None, &mut units);

        Ok(FileExtraction {
            file_path: file_path.to_string(),
            language,
            units,
            metrics,
            heuristic: false,
            source: source.to_string(),
        })
    }

    /// Parse content string with the appropriate language parser
    fn parse_content(
        &mut self,
        file_path: &str,
        content: &str,
        language: Language,
    ) -> Result<Tree, ExtractionError> {
        let parser = match language {
            Language::Rust => &mut self.rust_parser,
            Language::Python => &mut self.python_parser,
            Language::JavaScript => &mut self.javascript_parser,
            Language::TypeScript => &mut self.typescript_parser,
            Language::Tsx => &mut self.tsx_parser,
            Language::Go => &mut self.go_parser,
            other => {
                return Err(ExtractionError::Parser {
                    language: other.name().to_string(),
                    message: "no structural parser".to_string(),
                })
            }
        };

        parser.parse(content, None).ok_or_else(|| ExtractionError::NoTree {
            path: file_path.into(),
        })
    }
}

fn parser_for(grammar: tree_sitter::Language, language: Language) -> Result<Parser, ExtractionError> {
    let mut parser = Parser::new();
    parser
        .set_language(grammar)
        .map_err(|e| ExtractionError::Parser {
            language: language.name().to_string(),
            message: e.to_string(),
        })?;
    Ok(parser)
}

/// Whole-file unit for languages without a structural parser.
fn heuristic_unit(
    file_path: &str,
    source: &str,
    language: Language,
    metrics: &LineMetrics,
) -> Option<CodeUnit> {
    if metrics.code_lines == 0 {
        return None;
    }

    let symbol_name = Path::new(file_path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string());
    let end_line = source.lines().count().max(1);

    let mut unit = CodeUnit::new(file_path, &symbol_name, 1, end_line, language, 1, 0);
    unit.loc = metrics.code_lines;
    Some(unit)
}

/// Walk the AST in document order, emitting one unit per function.
fn collect_units(
    node: Node,
    file_path: &str,
    source: &str,
    language: Language,
    owner: Option<&str>,
    units: &mut Vec<CodeUnit>,
) {
    if let Some(name_node) = unit_name_node(node, language) {
        let name = match go_receiver_type(node, source) {
            Some(receiver) => qualify(Some(&receiver), node_text(name_node, source), language),
            None => qualify(owner, node_text(name_node, source), language),
        };
        units.push(CodeUnit::new(
            file_path,
            &name,
            node.start_position().row + 1,
            node.end_position().row + 1,
            language,
            cyclomatic_complexity(node, language),
            parameter_count(node, source, language),
        ));
        recurse(node, file_path, source, language, Some(&name), units);
        return;
    }

    if let Some(container) = container_name(node, source, language) {
        let name = qualify(owner, &container, language);
        recurse(node, file_path, source, language, Some(&name), units);
        return;
    }

    recurse(node, file_path, source, language, owner, units);
}

fn recurse(
    node: Node,
    file_path: &str,
    source: &str,
    language: Language,
    owner: Option<&str>,
    units: &mut Vec<CodeUnit>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_units(child, file_path, source, language, owner, units);
    }
}

fn qualify(owner: Option<&str>, name: &str, language: Language) -> String {
    match owner {
        Some(owner) => format!("{}{}{}", owner, language.scope_separator(), name),
        None => name.to_string(),
    }
}

/// Whether `node` becomes a code unit of its own.
pub(crate) fn is_unit_node(node: Node, language: Language) -> bool {
    unit_name_node(node, language).is_some()
}

/// Name node of a function-like declaration.
fn unit_name_node<'t>(node: Node<'t>, language: Language) -> Option<Node<'t>> {
    match language {
        Language::Rust => match node.kind() {
            "function_item" => node.child_by_field_name("name"),
            _ => None,
        },
        Language::Python => match node.kind() {
            "function_definition" => node.child_by_field_name("name"),
            _ => None,
        },
        Language::Go => match node.kind() {
            "function_declaration" | "method_declaration" => node.child_by_field_name("name"),
            _ => None,
        },
        Language::JavaScript | Language::TypeScript | Language::Tsx => match node.kind() {
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                node.child_by_field_name("name")
            }
            "arrow_function" | "function" | "function_expression" | "generator_function" => {
                // `const name = () => ...`
                let parent = node.parent()?;
                if parent.kind() != "variable_declarator"
                    || parent.child_by_field_name("value") != Some(node)
                {
                    return None;
                }
                parent
                    .child_by_field_name("name")
                    .filter(|name| name.kind() == "identifier")
            }
            _ => None,
        },
        _ => None,
    }
}

/// Name of a scope that qualifies the functions inside it.
fn container_name(node: Node, source: &str, language: Language) -> Option<String> {
    let name_node = match (language, node.kind()) {
        (Language::Rust, "impl_item") => node.child_by_field_name("type"),
        (Language::Rust, "trait_item" | "mod_item") => node.child_by_field_name("name"),
        (Language::Python, "class_definition") => node.child_by_field_name("name"),
        (
            Language::JavaScript | Language::TypeScript | Language::Tsx,
            "class_declaration" | "class" | "abstract_class_declaration",
        ) => node.child_by_field_name("name"),
        _ => None,
    }?;

    let text = node_text(name_node, source);
    // `Foo<T>` -> `Foo`
    let base = text.split('<').next().unwrap_or(text).trim();
    Some(base.to_string())
}

/// `func (c *Cart[T]) Total()` -> `Cart`
fn go_receiver_type(node: Node, source: &str) -> Option<String> {
    if node.kind() != "method_declaration" {
        return None;
    }
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|child| child.kind() == "parameter_declaration")?;
    let text = node_text(param.child_by_field_name("type")?, source);
    let base = text.trim_start_matches('*').split('[').next().unwrap_or(text).trim();
    Some(base.to_string())
}

fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(path: &str, source: &str, language: Language) -> FileExtraction {
        let mut parser = CodeParser::new().unwrap();
        parser.extract_source(path, source, language).unwrap()
    }

    fn unit<'a>(extraction: &'a FileExtraction, name: &str) -> &'a CodeUnit {
        extraction
            .units
            .iter()
            .find(|u| u.symbol_name == name)
            .unwrap_or_else(|| panic!("no unit named {name}"))
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("tsx"), Language::Tsx);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("unknown"), Language::Unknown);
        assert_eq!(Language::from_name("C++"), Language::Cpp);
        assert!(Language::Rust.has_structural_parser());
        assert!(Language::Go.has_structural_parser());
        assert!(!Language::Java.has_structural_parser());
    }

    #[test]
    fn test_extract_rust_functions() {
        let code = r#"fn classify(n: i32, flag: bool) -> &'static str {
    if n > 0 && flag {
        return "pos";
    }
    for _ in 0..n {}
    match n {
        0 => "zero",
        1 => "one",
        _ => "many",
    }
}

struct User {
    name: String,
}

impl User {
    fn new(name: String) -> Self {
        Self { name }
    }

    fn greet(&self) -> String {
        format!("hi {}", self.name)
    }
}
"#;
        let extraction = extract("src/user.rs", code, Language::Rust);
        assert_eq!(extraction.units.len(), 3);

        let classify = unit(&extraction, "classify");
        assert_eq!(classify.start_line, 1);
        assert_eq!(classify.end_line, 11);
        assert_eq!(classify.loc, 11);
        // if + && + for + three match arms
        assert_eq!(classify.cyclomatic_complexity, 7);
        assert_eq!(classify.parameter_count, 2);

        let new = unit(&extraction, "User::new");
        assert_eq!(new.parameter_count, 1);
        assert_eq!(new.cyclomatic_complexity, 1);

        let greet = unit(&extraction, "User::greet");
        assert_eq!(greet.parameter_count, 0);
    }

    #[test]
    fn test_nested_function_is_separate_unit() {
        let code = "fn outer() {\n    fn inner(x: bool) {\n        if x {}\n    }\n    if true {}\n}\n";
        let extraction = extract("nested.rs", code, Language::Rust);

        assert_eq!(extraction.units.len(), 2);
        assert_eq!(extraction.units[0].symbol_name, "outer");
        assert_eq!(extraction.units[0].cyclomatic_complexity, 2);
        assert_eq!(extraction.units[1].symbol_name, "outer::inner");
        assert_eq!(extraction.units[1].cyclomatic_complexity, 2);
    }

    #[test]
    fn test_extract_python_functions() {
        let code = r#"class User:
    def greet(self, other, loud=False):
        if loud and other:
            return "HI"
        elif other:
            return "hi"
        return None


def total(items):
    result = 0
    for item in items:
        while item > 0:
            item -= 1
    return result if result else 0
"#;
        let extraction = extract("app/user.py", code, Language::Python);
        assert_eq!(extraction.units.len(), 2);

        let greet = unit(&extraction, "User.greet");
        assert_eq!(greet.parameter_count, 2);
        // if + and + elif
        assert_eq!(greet.cyclomatic_complexity, 4);

        let total = unit(&extraction, "total");
        assert_eq!(total.parameter_count, 1);
        // for + while + conditional expression
        assert_eq!(total.cyclomatic_complexity, 4);
    }

    #[test]
    fn test_extract_javascript_functions() {
        let code = r#"const pick = (a, b) => (a ?? b) ? a : b;

function loop(items) {
  for (const x of items) {
    if (x) { continue; }
  }
  switch (items.length) {
    case 0: return 'none';
    default: return 'some';
  }
}

class Cart {
  add(item) { return item || null; }
}
"#;
        let extraction = extract("web/cart.js", code, Language::JavaScript);
        assert_eq!(extraction.units.len(), 3);

        let pick = unit(&extraction, "pick");
        assert_eq!(pick.parameter_count, 2);
        assert_eq!(pick.cyclomatic_complexity, 3);

        let looped = unit(&extraction, "loop");
        assert_eq!(looped.cyclomatic_complexity, 5);

        let add = unit(&extraction, "Cart.add");
        assert_eq!(add.parameter_count, 1);
        assert_eq!(add.cyclomatic_complexity, 2);
    }

    #[test]
    fn test_extract_typescript_function() {
        let code = "function add(a: number, b?: number): number {\n  return a + (b ?? 0);\n}\n";
        let extraction = extract("math.ts", code, Language::TypeScript);
        let add = unit(&extraction, "add");
        assert_eq!(add.parameter_count, 2);
        assert_eq!(add.cyclomatic_complexity, 2);
    }

    #[test]
    fn test_reextraction_is_idempotent() {
        let code = "def a():\n    pass\n\ndef b(x):\n    return x\n";
        let first = extract("m.py", code, Language::Python);
        let second = extract("m.py", code, Language::Python);

        let ids = |e: &FileExtraction| e.units.iter().map(|u| u.id.clone()).collect::<Vec<_>>();
        assert_eq!(first.units.len(), 2);
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_extract_go_functions() {
        let code = r#"package cart

type Cart struct {
	items []int
}

func (c *Cart) Total(discount int, strict bool) int {
	total := 0
	for _, item := range c.items {
		if item > 0 && !strict {
			total += item
		}
	}
	switch {
	case discount > total:
		return 0
	case discount > 0:
		total -= discount
	default:
	}
	return total
}

func Sum(a, b int, rest ...int) int {
	return a + b
}

func Wait(ch chan int, v interface{}) string {
	select {
	case <-ch:
		return "ready"
	}
	switch v.(type) {
	case int:
		return "int"
	case string:
		return "string"
	}
	return ""
}
"#;
        let extraction = extract("cart/cart.go", code, Language::Go);
        assert!(!extraction.heuristic);
        assert_eq!(extraction.units.len(), 3);

        let total = unit(&extraction, "Cart.Total");
        assert_eq!(total.start_line, 7);
        assert_eq!(total.end_line, 22);
        // receiver is not a parameter
        assert_eq!(total.parameter_count, 2);
        // for + if + && + two expression cases
        assert_eq!(total.cyclomatic_complexity, 6);

        let sum = unit(&extraction, "Sum");
        assert_eq!(sum.parameter_count, 3);
        assert_eq!(sum.cyclomatic_complexity, 1);

        let wait = unit(&extraction, "Wait");
        assert_eq!(wait.parameter_count, 2);
        // one select case + two type cases
        assert_eq!(wait.cyclomatic_complexity, 4);
    }

    #[test]
    fn test_heuristic_unit_for_unsupported_language() {
        let code = "package app;\n\n// entry point\nclass Main {\n}\n";
        let extraction = extract("src/Main.java", code, Language::Java);

        assert!(extraction.heuristic);
        assert_eq!(extraction.units.len(), 1);
        let unit = &extraction.units[0];
        assert_eq!(unit.symbol_name, "Main.java");
        assert_eq!(unit.start_line, 1);
        assert_eq!(unit.end_line, 5);
        assert_eq!(unit.loc, 3);
        assert_eq!(unit.cyclomatic_complexity, 1);
        assert_eq!(extraction.metrics.comment_lines, 1);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let mut parser = CodeParser::new().unwrap();
        let err = parser
            .extract_source("broken.rs", "fn broken( {\n", Language::Rust)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Syntax { .. }));
    }

    #[test]
    fn test_extract_file_reads_from_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("lib.rs"), "fn main() {}\n").unwrap();

        let mut parser = CodeParser::new().unwrap();
        let extraction = parser
            .extract_file(temp_dir.path(), "lib.rs", Language::Rust, 10)
            .unwrap();
        assert_eq!(extraction.units.len(), 1);
        assert_eq!(extraction.units[0].file_path, "lib.rs");

        let missing = parser.extract_file(temp_dir.path(), "missing.rs", Language::Rust, 10);
        assert!(matches!(missing, Err(ExtractionError::Read { .. })));
    }
}
