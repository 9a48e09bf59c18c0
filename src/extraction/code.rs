//! Rule-based fallback for source code.
//!
//! Line-based structural extraction, no parser: class-like definitions,
//! functions and imports per language. The detected language itself is
//! reported as a technology with high relevance.

use async_trait::async_trait;

use super::{context_window, ExtractionStrategy, ExtractionUnit, StrategyOutput};
use crate::error::ExtractionError;
use crate::types::{code_language, Entity, EntityType, ExtractionOptions, Mention};

const LANGUAGE_RELEVANCE: f32 = 0.95;
const IMPORT_RELEVANCE: f32 = 0.9;
const CLASS_RELEVANCE: f32 = 0.85;
const FUNCTION_RELEVANCE: f32 = 0.8;

/// Kind of a symbol found in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// class, struct, enum, trait, interface, type alias
    Class,
    /// function or method
    Function,
    Import,
}

impl SymbolKind {
    fn relevance(&self) -> f32 {
        match self {
            SymbolKind::Class => CLASS_RELEVANCE,
            SymbolKind::Function => FUNCTION_RELEVANCE,
            SymbolKind::Import => IMPORT_RELEVANCE,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Import => "import",
        }
    }
}

/// A named symbol and where its name appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Byte offset of the name in the scanned text
    pub offset: usize,
    /// 0-indexed line number
    pub line: usize,
}

/// Detect the language of a code unit: MIME tag first, then shebang, then keywords.
pub fn detect_language(content_type: &str, text: &str) -> Option<String> {
    if let Some(lang) = code_language(content_type).filter(|l| !l.is_empty()) {
        return Some(lang);
    }

    if let Some(first) = text.lines().next().filter(|l| l.starts_with("#!")) {
        let lower = first.to_lowercase();
        let lang = if lower.contains("python") {
            "python"
        } else if lower.contains("node") || lower.contains("deno") {
            "javascript"
        } else if lower.contains("ruby") {
            "ruby"
        } else if lower.contains("php") {
            "php"
        } else {
            "shell"
        };
        return Some(lang.to_string());
    }

    let lang = if text.contains("fn ") && (text.contains("->") || text.contains("let ") || text.contains("use ")) {
        "rust"
    } else if text.contains("package ") && text.contains("func ") {
        "go"
    } else if text.contains("def ") && (text.contains("self") || text.contains("):")) {
        "python"
    } else if text.contains("public class ") || text.contains("import java.") {
        "java"
    } else if text.contains("interface ") && text.contains(": ") && text.contains("=>") {
        "typescript"
    } else if text.contains("function ") || text.contains("=>") || text.contains("require(") {
        "javascript"
    } else {
        return None;
    };
    Some(lang.to_string())
}

fn display_language(lang: &str) -> String {
    match lang {
        "javascript" => "JavaScript".to_string(),
        "typescript" => "TypeScript".to_string(),
        "cpp" => "C++".to_string(),
        "csharp" => "C#".to_string(),
        "php" => "PHP".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Extract symbols for a language; unknown languages get a generic pass.
pub fn extract_symbols(text: &str, language: &str) -> Vec<Symbol> {
    let parse_line: fn(&str) -> Vec<(String, SymbolKind)> = match language {
        "rust" => rust_line,
        "python" => python_line,
        "javascript" | "typescript" | "jsx" | "tsx" => js_line,
        "go" => go_line,
        "java" | "kotlin" | "csharp" => java_line,
        _ => generic_line,
    };

    let mut symbols = Vec::new();
    let mut offset = 0;
    for (line_num, line) in text.split_inclusive('\n').enumerate() {
        let indent = line.len() - line.trim_start().len();
        for (name, kind) in parse_line(line.trim()) {
            if name.is_empty() || (name.starts_with("__") && name.ends_with("__")) {
                continue;
            }
            let at = line[indent..].find(name.as_str()).map_or(offset + indent, |i| offset + indent + i);
            symbols.push(Symbol {
                name,
                kind,
                offset: at,
                line: line_num,
            });
        }
        offset += line.len();
    }
    symbols
}

/// Text up to the first char that cannot be part of an identifier.
fn ident(rest: &str) -> String {
    rest.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect()
}

fn after_any<'a>(line: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| line.strip_prefix(p))
}

/// Strip `pub`, `pub(crate)` and friends.
fn strip_rust_visibility(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix("pub(") {
        return rest.find(')').map_or(line, |i| rest[i + 1..].trim_start());
    }
    line.strip_prefix("pub ").unwrap_or(line)
}

fn rust_line(line: &str) -> Vec<(String, SymbolKind)> {
    let line = strip_rust_visibility(line);
    if let Some(rest) = after_any(line, &["async fn ", "const fn ", "unsafe fn ", "fn "]) {
        return vec![(ident(rest), SymbolKind::Function)];
    }
    if let Some(rest) = after_any(line, &["struct ", "enum ", "trait ", "type ", "union "]) {
        return vec![(ident(rest), SymbolKind::Class)];
    }
    if let Some(rest) = line.strip_prefix("use ") {
        let root = rest
            .trim_end_matches(';')
            .split("::")
            .find(|seg| !matches!(*seg, "crate" | "self" | "super"))
            .unwrap_or("");
        return vec![(ident(root), SymbolKind::Import)];
    }
    if let Some(rest) = line.strip_prefix("extern crate ") {
        return vec![(ident(rest), SymbolKind::Import)];
    }
    vec![]
}

fn python_line(line: &str) -> Vec<(String, SymbolKind)> {
    if let Some(rest) = line.strip_prefix("class ") {
        return vec![(ident(rest), SymbolKind::Class)];
    }
    if let Some(rest) = after_any(line, &["async def ", "def "]) {
        return vec![(ident(rest), SymbolKind::Function)];
    }
    if let Some(rest) = line.strip_prefix("from ") {
        let module = rest.split_whitespace().next().unwrap_or("");
        return vec![(module.split('.').next().unwrap_or("").to_string(), SymbolKind::Import)];
    }
    if let Some(rest) = line.strip_prefix("import ") {
        return rest
            .split(',')
            .filter_map(|part| part.split_whitespace().next())
            .map(|module| (module.split('.').next().unwrap_or("").to_string(), SymbolKind::Import))
            .collect();
    }
    vec![]
}

fn js_line(line: &str) -> Vec<(String, SymbolKind)> {
    let line = line.strip_prefix("export default ").or_else(|| line.strip_prefix("export ")).unwrap_or(line);
    if let Some(rest) = after_any(line, &["abstract class ", "class "]) {
        return vec![(ident(rest), SymbolKind::Class)];
    }
    if let Some(rest) = after_any(line, &["interface ", "type ", "enum "]) {
        if line.starts_with("type ") && !line.contains('=') {
            return vec![];
        }
        return vec![(ident(rest), SymbolKind::Class)];
    }
    if let Some(rest) = after_any(line, &["async function ", "function "]) {
        return vec![(ident(rest.trim_start_matches('*').trim_start()), SymbolKind::Function)];
    }
    for kw in ["const ", "let ", "var "] {
        if let Some(rest) = line.strip_prefix(kw) {
            if line.contains("=>") || line.contains("= function") {
                return vec![(ident(rest), SymbolKind::Function)];
            }
            if let Some(module) = require_target(line) {
                return vec![(module, SymbolKind::Import)];
            }
        }
    }
    if line.starts_with("import ") {
        if let Some(module) = quoted_after(line, " from ").or_else(|| quoted_after(line, "import ")) {
            return vec![(module, SymbolKind::Import)];
        }
    }
    vec![]
}

fn go_line(line: &str) -> Vec<(String, SymbolKind)> {
    if let Some(rest) = line.strip_prefix("func ") {
        // Methods: func (r *Recv) Name(
        let rest = if rest.starts_with('(') {
            rest.find(')').map_or(rest, |i| rest[i + 1..].trim_start())
        } else {
            rest
        };
        return vec![(ident(rest), SymbolKind::Function)];
    }
    if let Some(rest) = line.strip_prefix("type ") {
        return vec![(ident(rest), SymbolKind::Class)];
    }
    if line.starts_with("import ") || line.starts_with('"') {
        if let Some(path) = quoted_after(line, "") {
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            return vec![(name, SymbolKind::Import)];
        }
    }
    vec![]
}

fn java_line(line: &str) -> Vec<(String, SymbolKind)> {
    if let Some(rest) = line.strip_prefix("import ") {
        let path = rest.trim_start_matches("static ").trim_end_matches(';');
        let mut parts = path.split('.');
        let library = match (parts.next(), parts.next()) {
            (Some(first @ ("java" | "javax" | "kotlin")), _) => first,
            (Some(_), Some(second)) => second,
            (Some(first), None) => first,
            _ => "",
        };
        return vec![(library.to_string(), SymbolKind::Import)];
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    if let Some(i) = words
        .iter()
        .position(|w| matches!(*w, "class" | "interface" | "enum" | "record"))
    {
        if let Some(name) = words.get(i + 1) {
            return vec![(ident(name), SymbolKind::Class)];
        }
    }

    // Method declarations: modifiers, return type, name(
    let is_decl = words
        .first()
        .is_some_and(|w| matches!(*w, "public" | "private" | "protected" | "static" | "fun" | "override"));
    if is_decl && line.contains('(') && !line.contains(" new ") && !line.ends_with(';') {
        if let Some(before_paren) = line.split('(').next() {
            if let Some(name) = before_paren.split_whitespace().last() {
                return vec![(ident(name), SymbolKind::Function)];
            }
        }
    }
    vec![]
}

/// Keyword-agnostic pass for languages without a dedicated parser.
fn generic_line(line: &str) -> Vec<(String, SymbolKind)> {
    if let Some(rest) = after_any(line, &["class ", "module ", "struct "]) {
        return vec![(ident(rest), SymbolKind::Class)];
    }
    if let Some(rest) = after_any(line, &["def ", "function ", "func ", "fn ", "sub "]) {
        return vec![(ident(rest), SymbolKind::Function)];
    }
    if let Some(rest) = after_any(line, &["require ", "import ", "use ", "#include "]) {
        let target = quoted_after(line, "").unwrap_or_else(|| {
            ident(rest.trim_start_matches(|c: char| c == '<' || c == '\'' || c == '"'))
        });
        return vec![(target, SymbolKind::Import)];
    }
    vec![]
}

/// First single- or double-quoted string after `marker`.
fn quoted_after(line: &str, marker: &str) -> Option<String> {
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let open = rest.find(|c: char| c == '"' || c == '\'' || c == '`')?;
    let quote = rest[open..].chars().next()?;
    let inner = &rest[open + 1..];
    let close = inner.find(quote)?;
    Some(inner[..close].to_string())
}

fn require_target(line: &str) -> Option<String> {
    quoted_after(line, "require(")
}

/// Rule-based fallback for the code family.
#[derive(Debug, Default, Clone)]
pub struct CodeRules;

impl CodeRules {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExtractionStrategy for CodeRules {
    fn name(&self) -> &str {
        "code-rules"
    }

    async fn extract(
        &self,
        unit: &ExtractionUnit<'_>,
        options: &ExtractionOptions,
    ) -> Result<StrategyOutput, ExtractionError> {
        let text = unit.text();
        let language = detect_language(unit.content_type, &text);
        let mut entities = Vec::new();

        if let Some(lang) = &language {
            // Fixed context and position so every chunk reports the same occurrence
            entities.push(
                Entity::new(display_language(lang), EntityType::Technology)
                    .with_description("programming language")
                    .with_mention(Mention::new(format!("language: {}", lang), 0, LANGUAGE_RELEVANCE)),
            );
        }

        let lang = language.as_deref().unwrap_or("");
        for symbol in extract_symbols(&text, lang) {
            let end = symbol.offset + symbol.name.len();
            if unit.in_overlap(end) {
                continue;
            }
            let context = context_window(&text, symbol.offset, end, options.context_window);
            let entity = Entity::new(symbol.name, EntityType::Technology)
                .with_description(format!("{} {}", lang, symbol.kind.as_str()).trim().to_string())
                .with_mention(Mention::new(context, unit.absolute(symbol.offset), symbol.kind.relevance()));
            entities.push(entity);
        }

        Ok(StrategyOutput::new(entities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_PY: &str = include_str!("../../tests/fixtures/sample.py");

    fn names_of(symbols: &[Symbol], kind: SymbolKind) -> Vec<&str> {
        symbols
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.name.as_str())
            .collect()
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("text/x-rust", ""), Some("rust".to_string()));
        assert_eq!(detect_language("text/code:kotlin", ""), Some("kotlin".to_string()));
        assert_eq!(detect_language("text/plain", SAMPLE_PY), Some("python".to_string()));
        assert_eq!(
            detect_language("text/plain", "package main\n\nfunc main() {}\n"),
            Some("go".to_string())
        );
        assert_eq!(detect_language("text/plain", "just words"), None);
    }

    #[test]
    fn test_python_fixture_symbols() {
        let symbols = extract_symbols(SAMPLE_PY, "python");
        assert_eq!(names_of(&symbols, SymbolKind::Class), vec!["DataProcessor"]);
        assert_eq!(
            names_of(&symbols, SymbolKind::Function),
            vec!["process_file", "process_all_files", "main"]
        );
        assert_eq!(
            names_of(&symbols, SymbolKind::Import),
            vec!["os", "sys", "json", "typing"]
        );

        let class = symbols.iter().find(|s| s.name == "DataProcessor").unwrap();
        assert_eq!(&SAMPLE_PY[class.offset..class.offset + 13], "DataProcessor");
    }

    #[test]
    fn test_rust_symbols() {
        let code = r#"
use std::collections::HashMap;
use crate::types::Chunk;

pub struct Config {
    value: i32,
}

impl Config {
    pub(crate) async fn load() -> Self {}
}

pub fn standalone_function() {}
"#;
        let symbols = extract_symbols(code, "rust");
        assert_eq!(names_of(&symbols, SymbolKind::Import), vec!["std", "types"]);
        assert_eq!(names_of(&symbols, SymbolKind::Class), vec!["Config"]);
        assert_eq!(names_of(&symbols, SymbolKind::Function), vec!["load", "standalone_function"]);
    }

    #[test]
    fn test_js_symbols() {
        let code = r#"
import React from 'react';
const express = require("express");

export class UserService {
    constructor() {}
}

export function helper() {}
const arrowFn = (x) => x * 2;
export interface UserProps {
    name: string;
}
"#;
        let symbols = extract_symbols(code, "typescript");
        assert_eq!(names_of(&symbols, SymbolKind::Import), vec!["react", "express"]);
        assert_eq!(names_of(&symbols, SymbolKind::Class), vec!["UserService", "UserProps"]);
        assert_eq!(names_of(&symbols, SymbolKind::Function), vec!["helper", "arrowFn"]);
    }

    #[test]
    fn test_go_and_java_symbols() {
        let go = "package main\n\nimport \"net/http\"\n\ntype Server struct {}\n\nfunc (s *Server) Start() error {\n}\n";
        let symbols = extract_symbols(go, "go");
        assert_eq!(names_of(&symbols, SymbolKind::Import), vec!["http"]);
        assert_eq!(names_of(&symbols, SymbolKind::Class), vec!["Server"]);
        assert_eq!(names_of(&symbols, SymbolKind::Function), vec!["Start"]);

        let java = "import org.springframework.boot.SpringApplication;\n\npublic class App {\n    public static void main(String[] args) {\n    }\n}\n";
        let symbols = extract_symbols(java, "java");
        assert_eq!(names_of(&symbols, SymbolKind::Import), vec!["springframework"]);
        assert_eq!(names_of(&symbols, SymbolKind::Class), vec!["App"]);
        assert_eq!(names_of(&symbols, SymbolKind::Function), vec!["main"]);
    }

    #[tokio::test]
    async fn test_language_entity_and_relevances() {
        let unit = ExtractionUnit::text_only(SAMPLE_PY.as_bytes(), "text/x-python");
        let out = CodeRules::new()
            .extract(&unit, &ExtractionOptions::default())
            .await
            .unwrap();

        let language = &out.entities[0];
        assert_eq!(language.name, "Python");
        assert_eq!(language.entity_type, EntityType::Technology);
        assert_eq!(language.mentions[0].relevance, 0.95);

        let class = out.entities.iter().find(|e| e.name == "DataProcessor").unwrap();
        assert_eq!(class.mentions[0].relevance, 0.85);
        let import = out.entities.iter().find(|e| e.name == "json").unwrap();
        assert_eq!(import.mentions[0].relevance, 0.9);
        assert!(out.entities.iter().all(|e| e.entity_type == EntityType::Technology));
    }

    #[tokio::test]
    async fn test_language_entity_identical_across_chunks() {
        let first = ExtractionUnit::text_only(b"def a():\n    pass\n", "text/x-python");
        let second = ExtractionUnit::text_only(b"def b():\n    pass\n", "text/x-python");
        let rules = CodeRules::new();
        let options = ExtractionOptions::default();
        let a = rules.extract(&first, &options).await.unwrap().entities;
        let b = rules.extract(&second, &options).await.unwrap().entities;
        let merged = crate::merge::merge_entities(a, b);
        let python = merged.iter().find(|e| e.name == "Python").unwrap();
        assert_eq!(python.mentions.len(), 1);
    }
}
