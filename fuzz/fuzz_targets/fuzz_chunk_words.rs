#![no_main]

use libfuzzer_sys::fuzz_target;
use raglens::chunk_words;

fuzz_target!(|input: (&str, u8, u8)| {
    let (text, chunk_size, overlap) = input;
    let (chunk_size, overlap) = (chunk_size as usize, overlap as usize);

    match chunk_words(text, chunk_size, overlap) {
        Ok(chunks) => {
            assert!(overlap < chunk_size);
            let total = text.split_whitespace().count();
            if total == 0 {
                assert!(chunks.is_empty());
            }
            for chunk in &chunks {
                let n = chunk.split_whitespace().count();
                assert!(n >= 1 && n <= chunk_size);
            }
        }
        Err(e) => assert!(e.is_config()),
    }
});
