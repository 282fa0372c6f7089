//! Fuzz target: `CommandFramer::feed`
//!
//! Drives arbitrary byte sequences into the line framer and asserts that
//! it never panics, never buffers past `MAX_LINE_LEN`, and never yields a
//! line containing a line break.
//!
//! cargo fuzz run fuzz_command_framer

#![no_main]

use libfuzzer_sys::fuzz_target;
use slowctl::protocol::CommandFramer;
use slowctl::protocol::framer::MAX_LINE_LEN;

fuzz_target!(|data: &[u8]| {
    // First byte picks the terminator so CR-terminated sessions are covered.
    let (terminator, body) = match data.split_first() {
        Some((&t, rest)) if t & 1 == 1 => (b'\r', rest),
        Some((_, rest)) => (b'\n', rest),
        None => (b'\n', data),
    };
    let mut framer = CommandFramer::new(terminator);

    for line in framer.feed(body).into_iter().flatten() {
        assert!(line.len() <= MAX_LINE_LEN, "line exceeds MAX_LINE_LEN");
        assert!(!line.contains('\r') && !line.contains('\n'));
    }
    assert!(framer.pending() <= MAX_LINE_LEN);

    // After a reset the framer must accept bytes cleanly again.
    framer.reset();
    assert_eq!(framer.feed(&[b'A', terminator]), vec![Ok("A".to_string())]);
});
