use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parsers_core::{compile_grammar, lexer::Lexer, synthesize};

// ============================================================================
// Test Data
// ============================================================================

const GRAMMAR: &str = "keywordCell
intCell
nameCell
 regex [a-z]+
refCell
 enumFromCellTypes nameCell
colorCell
 enum red green blue
programParser
 root
 inScope letParser printParser blockParser colorParser
letParser
 crux let
 cells keywordCell nameCell intCell
 compiler
  stringTemplate let {nameCell} = {intCell};
printParser
 crux print
 cells keywordCell refCell
 compiler
  stringTemplate console.log({refCell});
colorParser
 cells colorCell intCell
blockParser
 crux block
 cells keywordCell
 inScope letParser printParser colorParser
 compiler
  stringTemplate {
  closeChildren }";

fn generate_program(blocks: usize) -> String {
    let mut lines = Vec::with_capacity(blocks * 4);
    for i in 0..blocks {
        let name: String = (0..3).map(|k| (b'a' + ((i / 26usize.pow(k)) % 26) as u8) as char).collect();
        lines.push(format!("let {name} {i}"));
        lines.push("block".to_string());
        lines.push(format!(" print {name}"));
        lines.push(format!(" green {i}"));
    }
    lines.join("\n")
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_grammar_compile(c: &mut Criterion) {
    c.bench_function("grammar_compile", |b| {
        b.iter(|| compile_grammar(black_box(GRAMMAR)))
    });
}

fn bench_lexer_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_scaling");
    for size in [10, 100, 1000] {
        let source = generate_program(size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, src| {
            b.iter(|| Lexer::new(black_box(src)).lex())
        });
    }
    group.finish();
}

fn bench_parse_and_validate(c: &mut Criterion) {
    let grammar = compile_grammar(GRAMMAR).unwrap();
    let mut group = c.benchmark_group("parse_and_validate");
    for size in [10, 100, 1000] {
        let source = generate_program(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, src| {
            b.iter(|| grammar.parse(black_box(src)).errors())
        });
    }
    group.finish();
}

fn bench_compile_output(c: &mut Criterion) {
    let grammar = compile_grammar(GRAMMAR).unwrap();
    let mut group = c.benchmark_group("compile_output");
    for size in [10, 100, 1000] {
        let source = generate_program(size);
        let doc = grammar.parse(&source);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| doc.compile())
        });
    }
    group.finish();
}

fn bench_synthesis(c: &mut Criterion) {
    let grammar = compile_grammar(GRAMMAR).unwrap();
    c.bench_function("synthesize_100", |b| {
        b.iter(|| synthesize(&grammar, black_box(100), 7))
    });
}

criterion_group!(grammar_benches, bench_grammar_compile);

criterion_group!(
    document_benches,
    bench_lexer_scaling,
    bench_parse_and_validate,
    bench_compile_output
);

criterion_group!(synthesis_benches, bench_synthesis);

criterion_main!(grammar_benches, document_benches, synthesis_benches);
