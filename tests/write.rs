use std::sync::Arc;

use npyz::{NpyFile, WriterBuilder};
use zarrs::array::Array;
use zarrs::filesystem::FilesystemStore;
use zarrs::storage::store::MemoryStore;
use zarrs_datachunk::sources::{FrameSource, InMemoryFrames, RecordingSource};
use zarrs_datachunk::{ArrayWriter, ChunkedArraySource, Compression, SizingOptions, WriteOptions};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn init_logger() {
    env_logger::try_init().ok();
}

/// A `samples x channels` float32 recording, serialised as .npy.
fn recording_npy(num_samples: u64, num_channels: u64) -> Vec<u8> {
    let data: Vec<f32> = (0..num_samples * num_channels)
        .map(|i| (i as f32 * 0.37).sin() * 100.0)
        .collect();
    let mut buf = Vec::new();
    let mut writer = npyz::WriteOptions::<f32>::new()
        .default_dtype()
        .shape(&[num_samples, num_channels])
        .writer(&mut buf)
        .begin_nd()
        .expect("should be able to start npy");
    writer.extend(data).expect("should be able to write npy");
    writer.finish().expect("should be able to finish npy");
    buf
}

/// Get shape and values from an .npy payload.
fn read_npy(bytes: &[u8]) -> (Vec<u64>, Vec<f32>) {
    let f = NpyFile::new(bytes).expect("should be valid");
    let shape = f.shape().to_vec();
    let data = f
        .into_vec::<f32>()
        .expect("should be able to read data to vec");
    (shape, data)
}

fn recording_source(npy: &[u8]) -> RecordingSource<f32> {
    let (shape, data) = read_npy(npy);
    RecordingSource::new(data, shape[1] as usize).expect("recording should be rectangular")
}

#[test]
fn test_recording_round_trip() -> TestResult {
    init_logger();
    let npy = recording_npy(2500, 6);
    let (raw_shape, raw_data) = read_npy(&npy);

    let source = ChunkedArraySource::new(
        recording_source(&npy),
        SizingOptions::default()
            .with_chunk_shape([256, 6])
            .with_buffer_shape([1024, 6]),
    )?;
    assert_eq!(source.tiles_total(), 3);

    let store = Arc::new(MemoryStore::default());
    let writer = ArrayWriter::new(
        store,
        "/acquisition/ElectricalSeries",
        WriteOptions::default().with_compression(Compression::Gzip { level: 5 }),
    );
    let array = writer.write(source)?;

    assert_eq!(array.shape(), raw_shape.as_slice());
    assert_eq!(array.retrieve_array_subset::<Vec<f32>>(&array.subset_all())?, raw_data);
    Ok(())
}

#[test]
fn test_written_chunks_match_planned_chunks() -> TestResult {
    init_logger();
    let npy = recording_npy(2500, 6);
    let source = ChunkedArraySource::builder(recording_source(&npy))
        .chunk_mb(0.01)
        .display_progress(true)
        .build()?;
    let planned = source.chunk_shape().to_vec();
    assert_eq!(planned, vec![256, 6]);

    let writer = ArrayWriter::new(
        Arc::new(MemoryStore::default()),
        "/traces",
        WriteOptions::default(),
    );
    let array = writer.write(source)?;
    let written: Vec<u64> = array.chunk_shape(&[0, 0])?.iter().map(|n| n.get()).collect();
    assert_eq!(written, planned);
    assert_eq!(array.chunk_grid_shape(), &[10, 1]);
    Ok(())
}

#[test]
fn test_frames_round_trip() -> TestResult {
    init_logger();
    let (num, h, w) = (9u64, 5u64, 7u64);
    let frames: Vec<Vec<u8>> = (0..num)
        .map(|f| (0..h * w).map(|p| (f * 31 + p) as u8).collect())
        .collect();
    let expected: Vec<u8> = frames.iter().flatten().copied().collect();

    let reader = InMemoryFrames::new(frames, vec![h, w])?;
    let source = ChunkedArraySource::builder(FrameSource::new(reader)?)
        .chunk_shape([2, 5, 7])
        .buffer_shape([4, 5, 7])
        .build()?;
    assert_eq!(source.maxshape(), &[9, 5, 7]);

    let options = WriteOptions::from_json(
        r#"{
            "compression": {"type": "zstd", "level": 3},
            "dimension_names": ["frame", "y", "x"],
            "attributes": {"rate": 30.0}
        }"#,
    )?;
    let writer = ArrayWriter::new(Arc::new(MemoryStore::default()), "/video", options);
    let array = writer.write(source)?;

    assert_eq!(array.retrieve_array_subset::<Vec<u8>>(&array.subset_all())?, expected);
    assert_eq!(array.attributes()["rate"], 30.0);
    Ok(())
}

#[test]
fn test_filesystem_round_trip() -> TestResult {
    init_logger();
    let dir = tempfile::TempDir::new()?;
    let npy = recording_npy(300, 3);
    let (_, raw_data) = read_npy(&npy);

    let store = Arc::new(FilesystemStore::new(dir.path())?);
    let source = ChunkedArraySource::builder(recording_source(&npy))
        .chunk_shape([64, 3])
        .buffer_gb(64.0 * 3.0 * 4.0 * 2.0 / (1u64 << 30) as f64)
        .build()?;
    assert_eq!(source.buffer_shape(), &[128, 3]);

    let writer = ArrayWriter::new(
        store.clone(),
        "/traces",
        WriteOptions::default().with_compression(Compression::Bzip2 { block_size: 9 }),
    );
    writer.write(source)?;

    let reopened = Array::open(store, "/traces")?;
    assert_eq!(reopened.shape(), &[300, 3]);
    assert_eq!(reopened.retrieve_array_subset::<Vec<f32>>(&reopened.subset_all())?, raw_data);
    Ok(())
}

#[test]
fn test_source_error_stops_writing() -> TestResult {
    init_logger();
    let npy = recording_npy(10, 2);
    let source = ChunkedArraySource::builder(recording_source(&npy))
        .maxshape([12, 2])
        .chunk_shape([4, 2])
        .buffer_shape([4, 2])
        .build()?;
    let writer = ArrayWriter::new(
        Arc::new(MemoryStore::default()),
        "/bad",
        WriteOptions::default(),
    );
    // the recording only has 10 samples, so the last tile fails
    let Err(err) = writer.write(source) else {
        panic!("writing past the end of the recording should fail");
    };
    assert!(
        err.downcast_source::<zarrs_datachunk::sources::RecordingError>()
            .is_some(),
        "{err}"
    );
    Ok(())
}

#[test]
fn test_ragged_frames_rejected() {
    let mut frames = vec![vec![1u8; 4]; 6];
    frames[3] = vec![1u8; 2];
    assert!(InMemoryFrames::new(frames, vec![2, 2]).is_err());
}
