use criterion::{black_box, criterion_group, criterion_main, Criterion};
use waferscan::KlarfParser;

/// Synthesize a result file with `defects` defect rows spread over the grid.
fn synthetic_klarf(defects: usize) -> String {
    let mut content = String::from(
        "FileVersion 1 2;\n\
         LotID \"BENCH-LOT\";\n\
         SampleSize 1 200;\n\
         DiePitch 5000.0 5000.0;\n\
         SampleCenterLocation 0.0 0.0;\n\
         ClassLookup 2\n 0 \"Unclassified\"\n 1 \"Particle\";\n\
         DefectRecordSpec 7 DEFECTID XREL YREL XINDEX YINDEX DEFECTAREA CLASSNUMBER ;\n\
         DefectList\n",
    );
    for i in 0..defects {
        let terminator = if i + 1 == defects { ";" } else { "" };
        content.push_str(&format!(
            " {} {}.0 {}.0 {} {} 9.6e-1 1{}\n",
            i + 1,
            (i * 7) % 4000,
            (i * 13) % 4000,
            (i % 20) as i64 - 10,
            (i % 16) as i64 - 8,
            terminator
        ));
    }
    content.push_str("EndOfFile;\n");
    content
}

fn bench_parse_klarf(c: &mut Criterion) {
    let content = synthetic_klarf(2000);
    c.bench_function("parse_klarf_2000_defects", |b| {
        b.iter(|| KlarfParser::parse_klarf_str(black_box(&content)));
    });
}

fn bench_build_die_map(c: &mut Criterion) {
    let content = synthetic_klarf(2000);
    let inspection = KlarfParser::parse_klarf_str(&content).unwrap().unwrap();
    c.bench_function("build_die_map_200mm", |b| {
        b.iter(|| {
            let mut inspection = inspection.clone();
            inspection.build_die_map();
            black_box(inspection.dies.len())
        });
    });
}

criterion_group!(benches, bench_parse_klarf, bench_build_die_map);
criterion_main!(benches);
