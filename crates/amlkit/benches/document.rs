use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use amlkit::{AmlResult, Document, ServerContext};

const ITEM_XML: &str = "<Item type='Part' id='A0D6B2F2E6A64C2B9F1B7E0F4B1E0A11'><item_number>A-100</item_number><name>Bolt &amp; Nut</name><owned_by_id><Item type='Identity' id='B0D6B2F2E6A64C2B9F1B7E0F4B1E0A11'><keyed_name>World</keyed_name></Item></owned_by_id></Item>";

fn response_xml() -> String {
    let items = ITEM_XML.repeat(50);
    format!(
        "<SOAP-ENV:Envelope xmlns:SOAP-ENV='http://schemas.xmlsoap.org/soap/envelope/'><SOAP-ENV:Body><Result>{items}</Result></SOAP-ENV:Body></SOAP-ENV:Envelope>"
    )
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("amlkit_document_parse", |b| {
        b.iter(|| Document::parse(black_box(ITEM_XML), ServerContext::default()))
    });
}

fn bench_serialize(c: &mut Criterion) {
    let Ok(doc) = Document::parse(ITEM_XML, ServerContext::default()) else {
        return;
    };
    let Some(root) = doc.root() else {
        return;
    };
    c.bench_function("amlkit_document_to_aml", |b| {
        b.iter(|| doc.to_aml(black_box(root)))
    });
}

fn bench_response(c: &mut Criterion) {
    let xml = response_xml();
    c.bench_function("amlkit_result_from_response", |b| {
        b.iter(|| AmlResult::from_response(black_box(&xml), ServerContext::default()))
    });
}

criterion_group!(benches, bench_parse, bench_serialize, bench_response);
criterion_main!(benches);
