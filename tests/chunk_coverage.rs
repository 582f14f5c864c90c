use std::fs;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use reconcile::ingest::chunk_reader::{make_chunk_ranges, ChunkReader};

fn random_dump(rng: &mut StdRng, lines: usize) -> String {
    let mut dump = String::new();
    for i in 0..lines {
        let fields = rng.gen_range(1..6);
        let line: Vec<String> = (0..fields)
            .map(|f| {
                let width = rng.gen_range(1..40);
                (0..width).map(|_| rng.gen_range(b'a'..=b'z') as char).collect::<String>() + &f.to_string()
            })
            .collect();
        dump.push_str(&format!("{}{}\n", i, line.join("\t")));
    }
    dump
}

#[test]
fn chunks_reconstruct_the_file_on_line_boundaries() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..20 {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");
        let lines = rng.gen_range(1..200);
        let dump = random_dump(&mut rng, lines);
        fs::write(&path, &dump).unwrap();

        let size = rng.gen_range(1..512);
        let ranges = make_chunk_ranges(&path, size).unwrap();
        let bytes = dump.as_bytes();

        let mut expected_start = 0;
        let mut rebuilt = Vec::new();
        for range in &ranges {
            assert_eq!(range.start, expected_start, "round {} size {}", round, size);
            if range.start > 0 {
                assert_eq!(bytes[range.start as usize - 1], b'\n', "round {} size {}", round, size);
            }
            let end = (range.end as usize).min(bytes.len());
            rebuilt.extend_from_slice(&bytes[range.start as usize..end]);
            expected_start = range.end;
        }
        assert_eq!(rebuilt, bytes, "round {} size {}", round, size);

        let whole: Vec<String> = dump.lines().map(str::to_string).collect();
        let mut read = Vec::new();
        for range in &ranges {
            let reader = ChunkReader::open(range).unwrap();
            for fields in reader.lines() {
                read.push(fields.unwrap().join("\t"));
            }
        }
        assert_eq!(read, whole, "round {} size {}", round, size);
    }
}

#[test]
fn unterminated_last_line_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.txt");
    fs::write(&path, "first\tline\nsecond\tline").unwrap();

    let ranges = make_chunk_ranges(&path, 4).unwrap();
    let lines: Vec<Vec<String>> = ranges
        .iter()
        .flat_map(|range| {
            let reader = ChunkReader::open(range).unwrap();
            reader
                .lines()
                .map(|fields| fields.unwrap().into_iter().map(str::to_string).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(lines, vec![vec!["first", "line"], vec!["second", "line"]]);
}
