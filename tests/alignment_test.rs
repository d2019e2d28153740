use parsers_core::cells::{align, Cell, CellTypeRef};
use parsers_core::{compile_grammar, Grammar, Value};

const GRAMMAR: &str = "keywordCell
intCell
boolCell
floatCell
nameCell
 regex [A-Z][a-z]+
totalCell
 enum total
moveParser
 crux move
 cells keywordCell intCell intCell
listParser
 crux list
 cells keywordCell
 catchAllCellType intCell
totalParser
 pattern total$
 cellParser postfix
 cells totalCell
 catchAllCellType floatCell
personParser
 pattern ^[A-Z0-9a-z]
 cellParser omnifix
 cells nameCell intCell boolCell";

fn cells(grammar: &Grammar, parser: &str, line: &str) -> Vec<Cell> {
    align(grammar, grammar.parser(parser).unwrap(), line)
}

fn ids(cells: &[Cell]) -> Vec<&str> {
    cells.iter().map(|c| c.cell_type_id.as_str()).collect()
}

#[test]
fn test_prefix_binds_in_order() {
    let grammar = compile_grammar(GRAMMAR).unwrap();
    let cells = cells(&grammar, "moveParser", "move 3 -4");
    assert_eq!(ids(&cells), vec!["keywordCell", "intCell", "intCell"]);
    assert_eq!(cells[2].value, Value::Int(-4));
    assert_eq!(cells[2].start, 7);
    assert!(cells.iter().all(|c| c.is_valid(&grammar, None)));
}

#[test]
fn test_prefix_missing_and_extra_words() {
    let grammar = compile_grammar(GRAMMAR).unwrap();

    let short = cells(&grammar, "moveParser", "move 3");
    assert_eq!(short.len(), 3);
    assert!(short[2].is_missing());
    assert_eq!(short[2].value, Value::Null);
    assert_eq!(short[2].start, 6);

    let long = cells(&grammar, "moveParser", "move 1 2 3 4");
    assert_eq!(long.len(), 5);
    assert_eq!(&ids(&long)[3..], &["extraWordCell", "extraWordCell"]);
    assert!(long[3..].iter().all(|c| c.cell_type == CellTypeRef::ExtraWord));
    assert_eq!(long[4].word.as_deref(), Some("4"));
}

#[test]
fn test_prefix_catch_all() {
    let grammar = compile_grammar(GRAMMAR).unwrap();
    let cells = cells(&grammar, "listParser", "list 1 2 3");
    assert_eq!(cells.len(), 4);
    assert!(!cells[0].is_catch_all);
    assert!(cells[1..].iter().all(|c| c.is_catch_all && c.cell_type_id == "intCell"));
}

#[test]
fn test_postfix_binds_required_cells_last() {
    let grammar = compile_grammar(GRAMMAR).unwrap();
    let cells = cells(&grammar, "totalParser", "1.5 2 total");
    assert_eq!(ids(&cells), vec!["floatCell", "floatCell", "totalCell"]);
    assert!(cells[0].is_catch_all && cells[1].is_catch_all);
    assert!(!cells[2].is_catch_all);
    assert_eq!(cells[0].value, Value::Float(1.5));

    let only = align(&grammar, grammar.parser("totalParser").unwrap(), "total");
    assert_eq!(ids(&only), vec!["totalCell"]);
}

#[test]
fn test_omnifix_binds_by_validity() {
    let grammar = compile_grammar(GRAMMAR).unwrap();
    let cells = cells(&grammar, "personParser", "true 5 Bob");
    assert_eq!(ids(&cells), vec!["boolCell", "intCell", "nameCell"]);
    assert_eq!(cells[0].value, Value::Boolean(true));
    assert!(cells.iter().all(|c| c.is_valid(&grammar, None)));
}

#[test]
fn test_omnifix_unknown_and_missing() {
    let grammar = compile_grammar(GRAMMAR).unwrap();
    let cells = cells(&grammar, "personParser", "5 5");
    assert_eq!(ids(&cells), vec!["intCell", "unknownCell", "nameCell", "boolCell"]);
    assert_eq!(cells[1].cell_type, CellTypeRef::Unknown);
    assert!(cells[2].is_missing() && cells[3].is_missing());
    assert_eq!((cells[2].index, cells[3].index), (2, 3));
}
