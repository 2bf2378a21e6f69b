use binary_telemetry::{
    parse, DataType, Field, FieldDescriptor, Log, LogOptions, LogReader, LogValue, Matrix, Record,
};

/// Writes one record of `values` into an in-memory log and decodes it again.
fn round_trip<R: Record>(values: &R) -> Vec<LogValue> {
    let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
    let mut stream = log.add_stream::<R>("rt", None).unwrap();
    stream.log(123, values).unwrap();
    drop(stream);
    let bytes = log.close().unwrap();

    let parsed = parse(&bytes).unwrap();
    let stream = parsed.get("rt").unwrap();
    assert_eq!(stream.timestamps, vec![123]);
    stream.records[0].clone()
}

fn single<F: Field>(value: F) -> LogValue {
    round_trip(&(value,)).remove(0)
}

#[test]
fn test_integer_round_trip() {
    assert_eq!(single(u8::MAX), LogValue::U8(u8::MAX));
    assert_eq!(single(i8::MIN), LogValue::I8(i8::MIN));
    assert_eq!(single(u16::MAX), LogValue::U16(u16::MAX));
    assert_eq!(single(i16::MIN), LogValue::I16(i16::MIN));
    assert_eq!(single(u32::MAX), LogValue::U32(u32::MAX));
    assert_eq!(single(i32::MIN), LogValue::I32(i32::MIN));
    assert_eq!(single(u64::MAX), LogValue::U64(u64::MAX));
    assert_eq!(single(i64::MIN), LogValue::I64(i64::MIN));
}

#[test]
fn test_float_round_trip_is_bit_exact() {
    for value in [0.0f32, -0.0, 1.5e-42, f32::MAX, f32::INFINITY, f32::NAN] {
        match single(value) {
            LogValue::F32(decoded) => assert_eq!(decoded.to_bits(), value.to_bits()),
            other => panic!("expected f32, got {:?}", other),
        }
    }
    for value in [0.0f64, -0.0, f64::MIN_POSITIVE, f64::MAX, f64::NEG_INFINITY, f64::NAN] {
        match single(value) {
            LogValue::F64(decoded) => assert_eq!(decoded.to_bits(), value.to_bits()),
            other => panic!("expected f64, got {:?}", other),
        }
    }
}

#[test]
fn test_bool_round_trip() {
    assert_eq!(round_trip(&(true, false)), vec![LogValue::Bool(true), LogValue::Bool(false)]);
}

#[test]
fn test_vector_round_trip() {
    let decoded = single([12.0f64, 4.0, -23.0, 5.0]);
    assert_eq!(
        decoded,
        LogValue::Array {
            rows: 4,
            cols: 1,
            elements: vec![
                LogValue::F64(12.0),
                LogValue::F64(4.0),
                LogValue::F64(-23.0),
                LogValue::F64(5.0)
            ],
        }
    );
}

#[test]
fn test_column_major_matrix_decodes_to_logical_layout() {
    let m = Matrix::<i32, 2, 3>::from_rows([[1, 2, 3], [4, 5, 6]]);
    let decoded = single(m);
    for r in 0..2u32 {
        for c in 0..3u32 {
            assert_eq!(
                decoded.at(r, c),
                Some(&LogValue::I32(m.get(r as usize, c as usize))),
                "mismatch at ({}, {})",
                r,
                c
            );
        }
    }
}

#[test]
fn test_row_major_and_column_major_sources_agree() {
    let rows = [[1u16, 2, 3, 4], [5, 6, 7, 8], [9, 10, 11, 12]];
    let from_nested = single(rows);
    let from_matrix = single(Matrix::<u16, 3, 4>::from_rows(rows));
    assert_eq!(from_nested, from_matrix);
}

#[test]
fn test_single_column_matrix_is_a_vector() {
    let decoded = single(Matrix::<u8, 3, 1>::from_column_major([[7, 8, 9]]));
    assert_eq!(
        decoded,
        LogValue::Array {
            rows: 3,
            cols: 1,
            elements: vec![LogValue::U8(7), LogValue::U8(8), LogValue::U8(9)],
        }
    );
}

#[test]
fn test_single_row_matrix_is_a_vector() {
    let m = Matrix::<u16, 1, 4>::from_rows([[1, 2, 3, 4]]);
    let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
    let mut stream = log.add_stream::<(Matrix<u16, 1, 4>,)>("row", None).unwrap();
    assert_eq!(
        stream.fields()[0],
        FieldDescriptor::Vector { element: DataType::U16, len: 4 }
    );
    stream.log(0, &(m,)).unwrap();
    drop(stream);
    let bytes = log.close().unwrap();

    // Storage order and logical order coincide, so the elements are copied.
    assert_eq!(&bytes[bytes.len() - 8..], &[1, 0, 2, 0, 3, 0, 4, 0]);

    let parsed = parse(&bytes).unwrap();
    assert_eq!(
        parsed.get("row").unwrap().records[0][0],
        LogValue::Array {
            rows: 4,
            cols: 1,
            elements: vec![
                LogValue::U16(1),
                LogValue::U16(2),
                LogValue::U16(3),
                LogValue::U16(4)
            ],
        }
    );
}

#[test]
fn test_mixed_record_round_trip() {
    type Mixed = (i32, bool, [f64; 4], Matrix<f64, 2, 3>, f64);
    let mat = Matrix::from_rows([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let values: Mixed = (42, true, [12.0, 4.0, -23.0, 5.0], mat, 123.0);
    let decoded = round_trip(&values);

    assert_eq!(decoded.len(), 5);
    assert_eq!(decoded[0], LogValue::I32(42));
    assert_eq!(decoded[1], LogValue::Bool(true));
    assert_eq!(decoded[3].at(0, 2), Some(&LogValue::F64(3.0)));
    assert_eq!(decoded[3].at(1, 0), Some(&LogValue::F64(4.0)));
    assert_eq!(decoded[4], LogValue::F64(123.0));
}

#[test]
fn test_multiple_streams_are_grouped() {
    let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
    let mut stuff = log
        .add_stream::<(i32, bool, f64)>("stuff", Some(&["my_ints", "my_bools", "my_doubles"]))
        .unwrap();
    let mut small = log
        .add_stream::<(u8, i8)>("small stream", Some(&["unsigned", "signed"]))
        .unwrap();

    stuff.log(4000, &(42, true, 123.0)).unwrap();
    small.log(12345, &(29, -2)).unwrap();
    stuff.log(4001, &(12, false, -9000.0)).unwrap();
    drop(stuff);
    drop(small);
    let parsed = parse(&log.close().unwrap()).unwrap();

    assert_eq!(parsed.names().collect::<Vec<_>>(), vec!["stuff", "small stream"]);
    let stuff = parsed.get("stuff").unwrap();
    assert_eq!(stuff.timestamps, vec![4000, 4001]);
    assert_eq!(
        stuff.column_by_label("my_ints").unwrap(),
        vec![&LogValue::I32(42), &LogValue::I32(12)]
    );
    assert_eq!(stuff.column_by_label("missing"), None);

    let small = parsed.by_id(1).unwrap();
    assert_eq!(small.records, vec![vec![LogValue::U8(29), LogValue::I8(-2)]]);
}

#[test]
fn test_truncated_log_keeps_complete_frames() {
    let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
    let mut stream = log.add_stream::<(u32, [f32; 2])>("cut", Some(&["n", "v"])).unwrap();
    for i in 0..3 {
        stream.log(i, &(i as u32, [i as f32, -(i as f32)])).unwrap();
    }
    drop(stream);
    let bytes = log.close().unwrap();

    let record_frame = 1 + 4 + 8 + 4 + 8;
    let full = parse(&bytes).unwrap();
    assert_eq!(full.get("cut").unwrap().len(), 3);
    assert!(!full.truncated);

    // Every cut inside the last record drops exactly that record.
    for cut in 1..record_frame {
        let parsed = parse(&bytes[..bytes.len() - cut]).unwrap();
        assert!(parsed.truncated, "cut {} not reported", cut);
        assert_eq!(parsed.get("cut").unwrap().len(), 2, "cut {}", cut);
    }
}

#[test]
fn test_reader_exposes_schema() {
    let log = Log::from_writer(Vec::new(), LogOptions::default()).unwrap();
    let stream = log.add_stream::<(u8, Matrix<f32, 2, 2>)>("s", Some(&["a", "b"])).unwrap();
    let expected_size = stream.record_size();
    drop(stream);
    let bytes = log.close().unwrap();

    let mut reader = LogReader::new(&bytes);
    while reader.read_frame().unwrap().is_some() {}
    let schema = reader.schema(0).unwrap();
    assert_eq!(schema.name, "s");
    assert_eq!(schema.record_size(), expected_size);
    assert_eq!(schema.labels.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
    assert_eq!(reader.position(), bytes.len());
}
