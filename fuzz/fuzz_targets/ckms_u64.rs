#![no_main]
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use libfuzzer_sys::fuzz_target;
use parbench::util::Xorshift;
use parbench::{Ckms, Summary};

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);

    // out of range values must be turned away, not panic
    let error: f64 = if let Ok(res) = cursor.read_f64::<BigEndian>() {
        res
    } else {
        return;
    };
    let phi: f64 = if let Ok(res) = cursor.read_f64::<BigEndian>() {
        res
    } else {
        return;
    };
    // bounded 2**16
    let upper_bound: u32 = if let Ok(res) = cursor.read_u32::<BigEndian>() {
        res % 65_536
    } else {
        return;
    };
    let seed: u64 = if let Ok(res) = cursor.read_u64::<BigEndian>() {
        res
    } else {
        return;
    };

    let mut ckms = match Ckms::<u64>::new(vec![(phi, error), (0.0, 0.01), (1.0, 0.01)]) {
        Ok(ckms) => ckms,
        Err(_) => return,
    };
    let mut xshft = Xorshift::new(seed);
    let mut min = u64::MAX;
    let mut max = 0;
    for _ in 0..upper_bound {
        let val = xshft.next_val() % 1_000_000;
        min = min.min(val);
        max = max.max(val);
        ckms.insert(val).unwrap();
    }
    assert_eq!(ckms.count(), upper_bound as usize);
    if upper_bound > 0 {
        assert_eq!(ckms.query(0.0), Ok(min));
        assert_eq!(ckms.query(1.0), Ok(max));
        ckms.query(phi).unwrap();
    }
});
