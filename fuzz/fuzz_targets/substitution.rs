#![no_main]
use amlkit::{Mode, ParameterSubstitution, ServerContext, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let (template, value) = s.split_once('\0').unwrap_or((s, "a'b<c>&d"));
        let mut sub = ParameterSubstitution::new();
        sub.add_parameter("0", Value::from(value));
        sub.add_parameter("1", Value::list([value, "x"]));
        let _ = sub.substitute(template, &ServerContext::default());
        sub.set_mode(Mode::Sql);
        let _ = sub.substitute(template, &ServerContext::default());
    }
});
