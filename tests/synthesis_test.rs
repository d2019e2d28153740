use parsers_core::synth::{synthesize_line, synthesize_program};
use parsers_core::{compile_grammar, parse, synthesize, Grammar};

const SCENE: &str = "keywordCell
colorCell
 enum red green blue
ratioCell
 extends floatCell
 min 0
 max 1
flagCell
 extends boolCell
levelCell
 extends intCell
 min 1
 max 3
sceneParser
 root
 inScope lightParser cameraParser colorParser
lightParser
 crux light
 cells keywordCell ratioCell flagCell
 inScope lightParser colorParser
cameraParser
 crux camera
 required
 single
 cells keywordCell bitCell levelCell
colorParser
 cells colorCell levelCell
debugParser
 crux debug
 tags doNotSynthesize
 cells keywordCell";

fn scene() -> Grammar {
    compile_grammar(SCENE).unwrap()
}

#[test]
fn test_synthesized_programs_parse_cleanly() {
    let grammar = scene();
    for program in synthesize(&grammar, 20, 0) {
        let errors = parse(&grammar, &program).errors();
        assert!(errors.is_empty(), "{program}\n{errors:?}");
    }
}

#[test]
fn test_synthesis_is_deterministic() {
    let grammar = scene();
    assert_eq!(synthesize(&grammar, 4, 9), synthesize(&grammar, 4, 9));
    assert_eq!(synthesize(&grammar, 3, 5)[1], synthesize_program(&grammar, 6));
    // A fresh compile of the same grammar yields the same programs.
    assert_eq!(synthesize(&grammar, 2, 1), synthesize(&scene(), 2, 1));
}

#[test]
fn test_program_shape() {
    let grammar = scene();
    let program = synthesize_program(&grammar, 3);
    let lines: Vec<&str> = program.lines().collect();
    assert!(lines[0].starts_with("light "));
    assert!(lines[1].starts_with(' '));
    assert!(lines.iter().any(|l| l.starts_with("camera ")));
    assert!(!program.contains("debug"));
    assert!(!program.contains("\n  light"));
}

#[test]
fn test_enum_keyed_line() {
    let grammar = scene();
    let color = grammar.parser("colorParser").unwrap().index;
    let line = synthesize_line(&grammar, color, 12);
    let words: Vec<&str> = line.split(' ').collect();
    assert_eq!(words.len(), 2);
    assert!(["red", "green", "blue"].contains(&words[0]));
    assert!(["1", "2", "3"].contains(&words[1]));
}

fn references(first: &str, second: &str) -> Grammar {
    let def = "defParser\n crux def\n cells keywordCell nameCell";
    let refer = "useParser\n crux use\n cells keywordCell refCell";
    let (first, second) = match (first, second) {
        ("def", _) => (def, refer),
        _ => (refer, def),
    };
    compile_grammar(&format!(
        "keywordCell\nnameCell\n examples ada grace\nrefCell\n enumFromCellTypes nameCell\nprogramParser\n root\n inScope defParser useParser\n{first}\n{second}"
    ))
    .unwrap()
}

#[test]
fn test_references_point_at_earlier_words() {
    let grammar = references("def", "use");
    for program in synthesize(&grammar, 10, 3) {
        let errors = parse(&grammar, &program).errors();
        assert!(errors.is_empty(), "{program}\n{errors:?}");
        let lines: Vec<&str> = program.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].replace("def", "use"), lines[1]);
    }
}

#[test]
fn test_reference_without_target_is_left_out() {
    let grammar = references("use", "def");
    for program in synthesize(&grammar, 10, 3) {
        assert!(parse(&grammar, &program).errors().is_empty(), "{program}");
        assert!(!program.contains("use"), "{program}");
        assert!(program.starts_with("def "));
    }
}

#[test]
fn test_keyed_root_synthesizes_its_own_lines() {
    let grammar = compile_grammar("intCell\naddParser\n root\n crux add\n cells keywordCell intCell").unwrap();
    let program = synthesize_program(&grammar, 4);
    assert!(program.starts_with("add "), "{program}");
    assert_eq!(program.lines().count(), 1);
    assert!(parse(&grammar, &program).errors().is_empty());
}
