use decodingus_reads::convert::{to_reads, to_reads_parallel};
use decodingus_reads::utils::bam_reader::{BamReaderFactory, RecordBatches};
use decodingus_reads::{Read, ReadError};
use rust_htslib::bam::header::HeaderRecord;
use rust_htslib::bam::record::{Aux, Cigar, CigarString};
use rust_htslib::bam::{self, Format, Header, Writer};
use tempfile::TempDir;

fn mapped_record(name: &[u8], pos: i64, md: &str) -> bam::Record {
    let mut record = bam::Record::new();
    record.set(
        name,
        Some(&CigarString(vec![Cigar::Match(2), Cigar::Ins(1), Cigar::Match(2)])),
        b"ACGTA",
        &[30, 30, 10, 30, 30],
    );
    record.unset_unmapped();
    record.set_tid(0);
    record.set_pos(pos);
    record.set_mapq(60);
    record.push_aux(b"MD", Aux::String(md)).unwrap();
    record
}

fn write_bam(dir: &TempDir, records: &[bam::Record]) -> String {
    let path = dir.path().join("reads.bam");
    let mut header = Header::new();
    let mut sq = HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", "chrY");
    sq.push_tag(b"LN", 1000);
    header.push_record(&sq);

    let mut writer = Writer::from_path(&path, &header, Format::Bam).unwrap();
    for record in records {
        writer.write(record).unwrap();
    }
    drop(writer);
    path.to_string_lossy().into_owned()
}

#[test]
fn reads_from_bam_file() {
    let dir = TempDir::new().unwrap();
    let mut unmapped = bam::Record::new();
    unmapped.set(b"u1", None, b"NNNN", &[2; 4]);
    let records = vec![
        mapped_record(b"r1", 100, "1A2"),
        mapped_record(b"r2", 200, "4"),
        unmapped,
    ];
    let path = write_bam(&dir, &records);

    let reader = BamReaderFactory::open(&path, None).unwrap();
    let batches: Vec<_> = RecordBatches::new(reader, 2, 0)
        .collect::<anyhow::Result<_>>()
        .unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);

    let records: Vec<bam::Record> = batches.into_iter().flatten().collect();
    let reads = to_reads_parallel(records, 2).unwrap();
    assert_eq!(reads.len(), 3);

    let first = &reads[0];
    assert_eq!(first.name(), "r1");
    assert!(first.is_canonical_record());
    assert_eq!(first.start(), Some(100));
    let snps: Vec<usize> = first
        .residues()
        .into_iter()
        .filter(|r| r.is_snp().unwrap())
        .map(|r| r.offset())
        .collect();
    assert_eq!(snps, vec![1]);
    let inserted = first.residues().get(2).unwrap();
    assert!(inserted.is_insertion().unwrap());
    assert_eq!(inserted.quality().value(), 10);

    let unmapped = &reads[2];
    assert!(!unmapped.is_aligned());
    assert!(!unmapped.residues().get(0).unwrap().is_regular_base().unwrap());
    assert!(matches!(
        unmapped.residues().get(0).unwrap().is_snp(),
        Err(ReadError::NotAligned { .. })
    ));
}

#[test]
fn max_records_limits_batches() {
    let dir = TempDir::new().unwrap();
    let records: Vec<_> = (0..5)
        .map(|i| mapped_record(format!("r{}", i).as_bytes(), i * 10, "4"))
        .collect();
    let path = write_bam(&dir, &records);

    let reader = BamReaderFactory::open(&path, None).unwrap();
    let total: usize = RecordBatches::new(reader, 2, 3)
        .map(|batch| batch.unwrap().len())
        .sum();
    assert_eq!(total, 3);
}

#[test]
fn invalid_htslib_record_is_rejected() {
    let mut record = mapped_record(b"bad", 0, "4");
    record.set_mapq(120);
    let err = to_reads(vec![record]).unwrap_err();
    assert!(err.to_string().contains("bad"));

    let mut record = mapped_record(b"bad-md", 0, "9");
    record.set_mapq(30);
    assert!(Read::new(record).is_err());
}
