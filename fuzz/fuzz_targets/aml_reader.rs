#![no_main]
use amlkit::{AmlResult, Document, ServerContext};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(doc) = Document::parse(s, ServerContext::default()) {
            for root in doc.roots() {
                let _ = doc.to_aml(root);
            }
        }
        let _ = AmlResult::from_response(s, ServerContext::default());
    }
});
