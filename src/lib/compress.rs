/// LZ77 style byte compressor producing the `stb_compress` stream format
///
/// Fonts embedded in source files are compressed with this format before being base85 encoded,
/// so that Dear ImGui can load them with `AddFontFromMemoryCompressedBase85TTF`.
///
/// Stream layout:
///
/// ```text
/// 57 BC 00 00 | 00 00 00 00 | len (u32 BE) | window (u32 BE) | opcodes ... | 05 FA | adler32 (u32 BE)
/// ```
///
/// Opcodes, by first byte:
///
/// | first byte  | meaning                                              |
/// |-------------|------------------------------------------------------|
/// | `0x80..`    | copy, len <= 128, dist <= 256                        |
/// | `0x40..`    | copy, len <= 256, dist <= 16K                        |
/// | `0x20..`    | literal run <= 32                                    |
/// | `0x18..`    | copy, len <= 256, dist <= 512K                       |
/// | `0x10..`    | copy, len <= 64K, dist <= 512K                       |
/// | `0x08..`    | literal run <= 2048                                  |
/// | `0x07`      | literal run <= 64K                                   |
/// | `0x06`      | copy, len <= 256, dist <= 16M                        |
/// | `0x04`      | copy, len <= 64K, dist <= 16M                        |
/// | `0x05 0xFA` | end of stream                                        |
use crate::GenError;
use log::debug;

const MAGIC: [u8; 4] = [0x57, 0xBC, 0x00, 0x00];
const WINDOW: usize = 0x40000;
const HASH_SIZE: usize = 32768;
const HASH_MASK: u32 = (HASH_SIZE as u32) - 1;
const LOOKAHEAD: usize = 12;
const MAX_RUN: usize = 65536;
const ADLER_MOD: u32 = 65521;
const ADLER_BLOCK: usize = 5552;

/// Adler-32 of `bytes`, continuing from `seed` (1 for a fresh checksum)
pub fn adler32(seed: u32, bytes: &[u8]) -> u32 {
    let mut s1 = seed & 0xffff;
    let mut s2 = seed >> 16;
    let first = bytes.len() % ADLER_BLOCK;
    let (head, tail) = bytes.split_at(first);
    for block in std::iter::once(head).chain(tail.chunks(ADLER_BLOCK)) {
        for &b in block {
            s1 += b as u32;
            s2 += s1;
        }
        s1 %= ADLER_MOD;
        s2 %= ADLER_MOD;
    }
    (s2 << 16) + s1
}

struct Encoder {
    out: Vec<u8>,
}

impl Encoder {
    fn out(&mut self, v: u32) {
        self.out.push(v as u8);
    }

    fn out2(&mut self, v: u32) {
        self.out(v >> 8);
        self.out(v);
    }

    fn out3(&mut self, v: u32) {
        self.out(v >> 16);
        self.out(v >> 8);
        self.out(v);
    }

    fn out4(&mut self, v: u32) {
        self.out(v >> 24);
        self.out(v >> 16);
        self.out(v >> 8);
        self.out(v);
    }

    fn literals(&mut self, lit: &[u8]) {
        for run in lit.chunks(MAX_RUN) {
            let n = run.len() as u32;
            if n <= 32 {
                self.out(0x20 + n - 1);
            } else if n <= 2048 {
                self.out2(0x0800 + n - 1);
            } else {
                self.out3(0x07_0000 + n - 1);
            }
            self.out.extend_from_slice(run);
        }
    }
}

fn not_crap(best: usize, dist: usize) -> bool {
    (best > 2 && dist <= 0x100) || (best > 5 && dist <= 0x4000) || (best > 7 && dist <= 0x80000)
}

fn acceptable(best: usize, dist: usize) -> bool {
    dist <= WINDOW && (best > 9 || not_crap(best, dist))
}

fn match_len(input: &[u8], a: usize, b: usize, max: usize) -> usize {
    (0..max).take_while(|&i| input[a + i] == input[b + i]).count()
}

fn scramble(h: u32) -> usize {
    (h.wrapping_add(h >> 16) & HASH_MASK) as usize
}

fn hash3(q: &[u8]) -> u32 {
    ((q[0] as u32) << 14) + ((q[1] as u32) << 7) + q[2] as u32
}

fn hash_next(h: u32, q: &[u8], c: usize, d: usize) -> u32 {
    (h << 14)
        .wrapping_add(h >> 18)
        .wrapping_add((q[c] as u32) << 7)
        .wrapping_add(q[d] as u32)
}

/// Compress `input` into a self-describing stream.
///
/// The output always carries the header and the checksum trailer, even for empty input.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut enc = Encoder {
        out: Vec::with_capacity(input.len() / 2 + 32),
    };
    enc.out.extend_from_slice(&MAGIC);
    enc.out4(0);
    enc.out4(input.len() as u32);
    enc.out4(WINDOW as u32);

    let mut chash: Vec<Option<usize>> = vec![None; HASH_SIZE];
    let end = input.len();
    let mut lit_start = 0usize;
    let mut q = 0usize;

    while q + LOOKAHEAD < end {
        let match_max = (end - q).min(MAX_RUN);
        let mut best = 2usize;
        let mut dist = 0usize;
        let window = &input[q..];

        let try_candidate = |slot: Option<usize>, skip_same: bool, best: &mut usize, dist: &mut usize| {
            if let Some(t) = slot {
                if skip_same && *dist == q - t {
                    return;
                }
                let m = match_len(input, t, q, match_max);
                if m > *best && acceptable(m, q - t) {
                    *best = m;
                    *dist = q - t;
                }
            }
        };

        let mut h = hash3(window);
        let h1 = scramble(h);
        try_candidate(chash[h1], false, &mut best, &mut dist);
        h = hash_next(h, window, 3, 4);
        let h2 = scramble(h);
        h = hash_next(h, window, 5, 6);
        try_candidate(chash[h2], true, &mut best, &mut dist);
        h = hash_next(h, window, 7, 8);
        let h3 = scramble(h);
        h = hash_next(h, window, 9, 10);
        try_candidate(chash[h3], true, &mut best, &mut dist);
        h = hash_next(h, window, 11, 12);
        let h4 = scramble(h);
        try_candidate(chash[h4], true, &mut best, &mut dist);

        // slots are shared, update only once every probe is done
        for slot in [h1, h2, h3, h4] {
            chash[slot] = Some(q);
        }

        if best < 3 {
            q += 1;
            continue;
        }

        let (b, d) = (best as u32, dist as u32);
        if best <= 0x80 && dist <= 0x100 {
            enc.literals(&input[lit_start..q]);
            enc.out(0x80 + b - 1);
            enc.out(d - 1);
        } else if best > 5 && best <= 0x100 && dist <= 0x4000 {
            enc.literals(&input[lit_start..q]);
            enc.out2(0x4000 + d - 1);
            enc.out(b - 1);
        } else if best > 7 && best <= 0x100 && dist <= 0x80000 {
            enc.literals(&input[lit_start..q]);
            enc.out3(0x18_0000 + d - 1);
            enc.out(b - 1);
        } else if best > 8 && best <= 0x10000 && dist <= 0x80000 {
            enc.literals(&input[lit_start..q]);
            enc.out3(0x10_0000 + d - 1);
            enc.out2(b - 1);
        } else if best > 9 && dist <= 0x100_0000 {
            let b = b.min(MAX_RUN as u32);
            enc.literals(&input[lit_start..q]);
            if b <= 0x100 {
                enc.out(0x06);
                enc.out3(d - 1);
                enc.out(b - 1);
            } else {
                enc.out(0x04);
                enc.out3(d - 1);
                enc.out2(b - 1);
            }
            q += b as usize;
            lit_start = q;
            continue;
        } else {
            q += 1;
            continue;
        }
        q += best;
        lit_start = q;
    }

    // the tail shorter than the lookahead is never hashed
    enc.literals(&input[lit_start..end]);
    enc.out2(0x05FA);
    enc.out4(adler32(1, input));

    debug!(
        "Compressed {} bytes into {} bytes",
        input.len(),
        enc.out.len()
    );
    enc.out
}

fn read_be(stream: &[u8], at: usize, n: usize) -> Result<u32, GenError> {
    let bytes = stream
        .get(at..at + n)
        .ok_or_else(|| GenError::format_error("compressed stream is truncated"))?;
    Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

fn copy_match(out: &mut Vec<u8>, dist: usize, len: usize) -> Result<(), GenError> {
    if dist == 0 || dist > out.len() {
        return Err(GenError::format_error(format!(
            "copy distance {} reaches before the start of the output ({} bytes)",
            dist,
            out.len()
        )));
    }
    let from = out.len() - dist;
    // source and destination may overlap
    for i in 0..len {
        let b = out[from + i];
        out.push(b);
    }
    Ok(())
}

fn copy_literals(out: &mut Vec<u8>, stream: &[u8], at: usize, len: usize) -> Result<(), GenError> {
    let bytes = stream
        .get(at..at + len)
        .ok_or_else(|| GenError::format_error("literal run goes past the end of the stream"))?;
    out.extend_from_slice(bytes);
    Ok(())
}

/// Decompress a stream produced by [`compress`], validating its framing and checksum.
pub fn decompress(stream: &[u8]) -> Result<Vec<u8>, GenError> {
    if stream.len() < 16 || stream[..4] != MAGIC {
        return Err(GenError::format_error("missing compressed stream signature"));
    }
    if read_be(stream, 4, 4)? != 0 {
        return Err(GenError::format_error("stream length does not fit in 32 bits"));
    }
    let expected_len = read_be(stream, 8, 4)? as usize;
    let mut out = Vec::with_capacity(expected_len);
    let mut i = 16usize;

    loop {
        let op = *stream
            .get(i)
            .ok_or_else(|| GenError::format_error("stream ends without trailer"))?;
        match op {
            0x80..=0xFF => {
                let dist = read_be(stream, i + 1, 1)? as usize + 1;
                copy_match(&mut out, dist, (op - 0x80) as usize + 1)?;
                i += 2;
            }
            0x40..=0x7F => {
                let dist = read_be(stream, i, 2)? as usize - 0x4000 + 1;
                let len = read_be(stream, i + 2, 1)? as usize + 1;
                copy_match(&mut out, dist, len)?;
                i += 3;
            }
            0x20..=0x3F => {
                let len = (op - 0x20) as usize + 1;
                copy_literals(&mut out, stream, i + 1, len)?;
                i += 1 + len;
            }
            0x18..=0x1F => {
                let dist = read_be(stream, i, 3)? as usize - 0x18_0000 + 1;
                let len = read_be(stream, i + 3, 1)? as usize + 1;
                copy_match(&mut out, dist, len)?;
                i += 4;
            }
            0x10..=0x17 => {
                let dist = read_be(stream, i, 3)? as usize - 0x10_0000 + 1;
                let len = read_be(stream, i + 3, 2)? as usize + 1;
                copy_match(&mut out, dist, len)?;
                i += 5;
            }
            0x08..=0x0F => {
                let len = read_be(stream, i, 2)? as usize - 0x0800 + 1;
                copy_literals(&mut out, stream, i + 2, len)?;
                i += 2 + len;
            }
            0x07 => {
                let len = read_be(stream, i + 1, 2)? as usize + 1;
                copy_literals(&mut out, stream, i + 3, len)?;
                i += 3 + len;
            }
            0x06 => {
                let dist = read_be(stream, i + 1, 3)? as usize + 1;
                let len = read_be(stream, i + 4, 1)? as usize + 1;
                copy_match(&mut out, dist, len)?;
                i += 5;
            }
            0x04 => {
                let dist = read_be(stream, i + 1, 3)? as usize + 1;
                let len = read_be(stream, i + 4, 2)? as usize + 1;
                copy_match(&mut out, dist, len)?;
                i += 6;
            }
            0x05 if stream.get(i + 1) == Some(&0xFA) => {
                if out.len() != expected_len {
                    return Err(GenError::format_error(format!(
                        "decoded {} bytes, header announced {}",
                        out.len(),
                        expected_len
                    )));
                }
                let checksum = read_be(stream, i + 2, 4)?;
                if checksum != adler32(1, &out) {
                    return Err(GenError::format_error("adler32 checksum mismatch"));
                }
                return Ok(out);
            }
            other => {
                return Err(GenError::format_error(format!(
                    "unknown opcode 0x{:02x} at offset {}",
                    other, i
                )))
            }
        }
        if out.len() > expected_len {
            return Err(GenError::format_error("stream decodes past its announced length"));
        }
    }
}
