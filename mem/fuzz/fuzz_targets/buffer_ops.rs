#![no_main]

use arbitrary::Arbitrary;
use conduit_mem::{Buffer, BufferPool, Buffers, NoPool};
use libfuzzer_sys::fuzz_target;
use std::{io::Read, sync::Arc};

#[derive(Arbitrary, Debug)]
struct Case {
    chunks: Vec<Vec<u8>>,
    split_at: usize,
    read_size: usize,
}

fn fuzz(case: Case) {
    let pool: Arc<dyn BufferPool> = Arc::new(NoPool);

    // Build a sequence from the chunks, splitting each one at an arbitrary
    // point to exercise shared-allocation views.
    let mut expected = Vec::new();
    let mut seq = Buffers::default();
    for chunk in &case.chunks {
        expected.extend_from_slice(chunk);
        let mut head = Buffer::copied(chunk, &pool);
        let tail = head.split_off(case.split_at % (chunk.len() + 1));
        seq.push(head);
        seq.push(tail);
    }
    assert_eq!(seq.len(), expected.len());

    // Flattening must reproduce the concatenation exactly.
    assert_eq!(seq.materialize(), expected);
    let flat = seq.coalesce(&pool);
    assert_eq!(&flat[..], &expected[..]);

    // Reading through an arbitrary chunk size must too.
    let mut reader = seq.into_reader();
    let mut out = Vec::new();
    let mut dst = vec![0; case.read_size.clamp(1, 64)];
    loop {
        let n = reader.read(&mut dst).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&dst[..n]);
    }
    assert_eq!(out, expected);
}

fuzz_target!(|case: Case| {
    fuzz(case);
});
