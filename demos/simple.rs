use parsers_core::{compile_grammar, synthesize};

fn main() {
    let grammar_source = "keywordCell
intCell
hostCell
 examples localhost
configParser
 root
 inScope hostParser portParser
hostParser
 crux host
 single
 cells keywordCell hostCell
portParser
 crux port
 single
 cells keywordCell intCell";

    let grammar = match compile_grammar(grammar_source) {
        Ok(grammar) => grammar,
        Err(e) => {
            eprintln!("Failed to compile grammar: {:?}", miette::Report::from(e));
            return;
        }
    };

    let mut doc = grammar.parse("host example.com\nprt 8080");
    for error in doc.errors() {
        println!("{}", error.message);
    }
    let fixed = doc.auto_fix_all();
    println!("Applied {fixed} fix(es):\n{doc}");

    match doc.to_json() {
        Ok(json) => println!("As JSON:\n{json}"),
        Err(e) => eprintln!("Failed to serialize: {e}"),
    }

    for program in synthesize(&grammar, 2, 7) {
        println!("Sample program:\n{program}");
    }
}
