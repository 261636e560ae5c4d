// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for job document parsing and ZPL rendering in the
// etikett-print crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use etikett_print::document::parse_payload;
use etikett_print::render::{encode_field, render_label};

const SHIP_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document>
  <Head><Printer>ZEBRA1</Printer><Label>SHIP</Label><Count>1</Count></Head>
  <Data>
    <BSTKD>PO 4711 & Söhne</BSTKD><MATNR>100200</MATNR><MAKTX>Schraube M6 µ-verzinkt</MAKTX>
    <NAME1>Müller Größenhandel</NAME1><ORT01>Düsseldorf</ORT01><VENDOR_TEXT>a<b</VENDOR_TEXT>
  </Data>
</Document>"#;

const SHIP_TEMPLATE: &str = "^XA^MTT^MMT^PR4,4^FH^FO20,20^FD$BSTKD$^FS^FO20,60^FD$MATNR$^FS\
^FO20,100^FD$MAKTX$^FS^FO20,140^FD$NAME1$^FS^FO20,180^FD$ORT01$^FS\
^FO20,220^FD$DATE$ $TIME$ $PRINTER$^FS^XFR:LOGO.zpl^FS^XZ";

/// Benchmark splitting and parsing a payload of concatenated documents.
fn bench_parse_payload(c: &mut Criterion) {
    c.bench_function("parse_payload (1 document)", |b| {
        b.iter(|| {
            let requests = parse_payload(black_box(SHIP_DOC));
            assert_eq!(requests.len(), 1);
        });
    });

    let burst = SHIP_DOC.repeat(16);
    c.bench_function("parse_payload (16 documents)", |b| {
        b.iter(|| {
            let requests = parse_payload(black_box(&burst));
            assert_eq!(requests.len(), 16);
        });
    });
}

/// Benchmark field encoding and full template rendering.
fn bench_render(c: &mut Criterion) {
    c.bench_function("encode_field", |b| {
        b.iter(|| black_box(encode_field(black_box(r"Größe\Maß ~ Ø 12 µm Übergabe"))));
    });

    let request = parse_payload(SHIP_DOC).remove(0);
    c.bench_function("render_label (ship template)", |b| {
        b.iter(|| black_box(render_label(black_box(SHIP_TEMPLATE), &request, false)));
    });
}

criterion_group!(benches, bench_parse_payload, bench_render);
criterion_main!(benches);
