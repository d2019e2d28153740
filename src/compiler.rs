use crate::document::{Document, DocumentNode};
use crate::serialization::Value;
use crate::utils::format_str;
use std::collections::BTreeMap;

const DEFAULT_INDENT: &str = " ";
const DEFAULT_JOIN: &str = "\n";
const DEFAULT_CATCH_ALL_DELIMITER: &str = " ";

impl Document<'_> {
    /// Renders the document through each definition's `compiler` settings. Lines without
    /// a `stringTemplate` are emitted as written.
    pub fn compile(&self) -> String {
        self.root()
            .children()
            .iter()
            .map(|child| self.compile_node(child, 0))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn compile_node(&self, node: &DocumentNode, depth: usize) -> String {
        let settings = &self.definition(node).compiler;
        let indent = settings
            .indent_character
            .as_deref()
            .unwrap_or(DEFAULT_INDENT)
            .repeat(depth);
        let line = match &settings.string_template {
            Some(template) => {
                let delimiter = settings
                    .catch_all_cell_delimiter
                    .as_deref()
                    .unwrap_or(DEFAULT_CATCH_ALL_DELIMITER);
                format_str(template, delimiter, &self.template_params(node))
            }
            None => node.line().to_string(),
        };
        if node.children().is_empty() {
            return format!("{indent}{line}");
        }

        let children = node
            .children()
            .iter()
            .map(|child| self.compile_node(child, depth + 1))
            .collect::<Vec<_>>()
            .join(settings.join_children_with.as_deref().unwrap_or(DEFAULT_JOIN));
        let open = settings.open_children.as_deref().unwrap_or("");
        let mut out = format!("{indent}{line}{open}\n{children}");
        if let Some(close) = &settings.close_children {
            out.push_str(&format!("\n{indent}{close}"));
        }
        out
    }

    /// Values a template can refer to: cells by cell type id (catch-all cells as a list),
    /// the content of `required`/`single` children by first word, then constants.
    pub fn template_params(&self, node: &DocumentNode) -> BTreeMap<String, Value> {
        let mut params = BTreeMap::new();
        for cell in self.cells(node).iter() {
            if cell.is_catch_all {
                match params
                    .entry(cell.cell_type_id.clone())
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    Value::Array(items) => items.push(cell.value.clone()),
                    other => *other = Value::Array(vec![cell.value.clone()]),
                }
            } else {
                params.insert(cell.cell_type_id.clone(), cell.value.clone());
            }
        }
        for child in node.children() {
            let def = self.definition(child);
            if def.required || def.single {
                params
                    .entry(child.first_word().to_string())
                    .or_insert_with(|| Value::String(child.content().unwrap_or("").to_string()));
            }
        }
        for (name, value) in self.definition(node).constants() {
            params.entry(name.clone()).or_insert_with(|| value.clone());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use crate::api::compile_grammar;

    const GRAMMAR: &str = "keywordCell
nameCell
intCell
programParser
 root
 inScope letParser blockParser
letParser
 crux let
 cells keywordCell nameCell intCell
 compiler
  stringTemplate const {nameCell} = {intCell};
blockParser
 crux block
 cells keywordCell
 catchAllCellType intCell
 inScope letParser
 string kind block
 compiler
  stringTemplate function() /* {kind} {intCell} */
  catchAllCellDelimiter ,
  openChildren  {
  closeChildren }";

    #[test]
    fn test_templates_and_wrappers() {
        let grammar = compile_grammar(GRAMMAR).unwrap();
        let doc = grammar.parse("let a 1\nblock 1 2\n let b 2");
        assert_eq!(
            doc.compile(),
            "const a = 1;\nfunction() /* block 1,2 */ {\n const b = 2;\n}"
        );
    }

    #[test]
    fn test_round_trip_without_templates() {
        let grammar = compile_grammar("fooParser\n crux foo").unwrap();
        let source = "anything goes\n nested\n  deeper\nmore";
        assert_eq!(grammar.parse(source).compile(), source);
    }
}
