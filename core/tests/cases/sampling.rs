use crate::common::TestHarness;
use serde_json::json;
use strobe_core::{
    DataLoggingReply, DataPoint, Generator, GeneratorConfig, Multimeter, Resolution, Time,
    Waveform,
};

#[test]
fn test_collects_previous_slices() {
    let mut h = TestHarness::new();
    let mm = h.add_multimeter(json!({ "interval": 1.0, "record_from": ["ramp", "one"] }));
    let gen = h.add_generator();
    h.connect(mm, gen);

    h.run_for(30.0);

    // slices at 10 and 20 request data of the slices before them
    assert_eq!(h.sim.requests_sent, 2);
    assert_eq!(h.sim.replies_delivered, 2);
    let expected: Vec<f64> = (1..=20).map(f64::from).collect();
    assert_eq!(h.column(mm, "ramp"), expected);
    assert_eq!(h.column(mm, "one"), vec![1.0; 20]);
    assert_eq!(h.times(mm), (1..=20).collect::<Vec<i64>>());
}

#[test]
fn test_update_order_does_not_matter() {
    let mut h = TestHarness::new();
    let gen = h.add_generator();
    let mm = h.add_multimeter(json!({ "interval": 5.0, "record_from": ["ramp"] }));
    h.connect(mm, gen);

    h.run_for(30.0);
    assert_eq!(h.column(mm, "ramp"), vec![5.0, 10.0, 15.0, 20.0]);
}

#[test]
fn test_window_filters_points() {
    let mut h = TestHarness::new();
    let mm = h.add_multimeter(json!({
        "interval": 1.0,
        "record_from": ["ramp"],
        "start": 5.0,
        "stop": 15.0,
    }));
    let gen = h.add_generator();
    h.connect(mm, gen);

    h.run_for(30.0);
    assert_eq!(h.times(mm), (6..=15).collect::<Vec<i64>>());
    assert_eq!(h.column(mm, "ramp").len(), 10);
}

#[test]
fn test_origin_shifts_window() {
    let mut h = TestHarness::new();
    let mm = h.add_multimeter(json!({
        "interval": 1.0,
        "record_from": ["ramp"],
        "origin": 10.0,
        "start": 0.0,
        "stop": 5.0,
    }));
    let gen = h.add_generator();
    h.connect(mm, gen);

    h.run_for(30.0);
    assert_eq!(h.times(mm), vec![11, 12, 13, 14, 15]);
}

#[test]
fn test_request_without_producers() {
    let mut h = TestHarness::new();
    let mm = h.add_multimeter(json!({ "record_from": ["ramp"] }));

    h.run_for(50.0);
    assert_eq!(h.sim.requests_sent, 4);
    assert_eq!(h.sim.replies_delivered, 0);
    assert!(h.multimeter(mm).store().is_empty());
    assert!(!h.multimeter(mm).flags().expecting_data);
}

#[test]
fn test_empty_record_list_still_requests() {
    let mut h = TestHarness::new();
    let mm = h.add_multimeter(json!({ "interval": 5.0, "record_from": [] }));
    let gen = h.add_generator();
    h.connect(mm, gen);

    h.run_for(20.0);
    assert_eq!(h.sim.requests_sent, 1);
    assert!(!h.multimeter(mm).flags().expecting_data);
    // stamps are logged, rows carry no columns
    assert_eq!(h.times(mm), vec![5, 10]);
    assert!(h.multimeter(mm).data().unwrap().is_empty());
}

#[test]
fn test_two_producers_interleave_per_slice() {
    let mut h = TestHarness::new();
    let mm = h.add_multimeter(json!({ "interval": 5.0, "record_from": ["level"] }));
    let low = Generator::new("low", GeneratorConfig::default())
        .with_signal("level", Waveform::Constant { value: -1.0 });
    let high = Generator::new("high", GeneratorConfig::default())
        .with_signal("level", Waveform::Constant { value: 1.0 });
    h.add(10, Box::new(low));
    h.add(11, Box::new(high));
    h.connect(mm, 10);
    h.connect(mm, 11);

    h.run_for(30.0);
    assert_eq!(h.column(mm, "level"), vec![-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0]);
    assert_eq!(
        h.multimeter(mm).device().events().senders,
        vec![10, 10, 11, 11, 10, 10, 11, 11]
    );
    assert!(h.multimeter(mm).flags().expecting_data);
}

#[test]
fn test_fine_resolution_times_in_ms() {
    let mut h = TestHarness::with_resolution(0.1, 10);
    let mm = h.add_multimeter(json!({ "interval": 0.5, "record_from": ["ramp"] }));
    let gen = h.add_generator();
    h.connect(mm, gen);

    h.run_for(3.0);
    let status = h.sim.get_status(mm).unwrap();
    let times: Vec<f64> = status["events"]["times"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    let ramp: Vec<f64> = status["events"]["data"][0]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    for (got, want) in times.iter().zip([0.5, 1.0, 1.5, 2.0]) {
        assert!((got - want).abs() < 1e-9, "time {} != {}", got, want);
    }
    assert_eq!(times.len(), 4);
    assert_eq!(ramp.len(), 4);
    assert!((ramp[3] - 2.0).abs() < 1e-9);
    assert_eq!(status["events"]["senders"], json!([gen, gen, gen, gen]));
}

#[test]
fn test_window_batch_with_sentinel() {
    let r = Resolution::new(1.0).unwrap();
    let mut mm = Multimeter::new("mm", &r);
    mm.set_parameters(&json!({ "record_from": ["a", "b"], "start": 0.0, "stop": 40.0 }), &r)
        .unwrap();
    strobe_core::Component::calibrate(&mut mm, &strobe_core::Clock::new(r, 10));

    let reply = DataLoggingReply {
        info: vec![
            DataPoint { timestamp: Time::step(10), data: vec![1.0, 2.0] },
            DataPoint { timestamp: Time::step(50), data: vec![3.0, 4.0] },
            DataPoint { timestamp: r.time_from_ms(f64::NAN), data: vec![0.0, 0.0] },
            DataPoint { timestamp: Time::step(30), data: vec![7.0, 8.0] },
        ],
    };
    let summary = mm.handle_reply(2, &reply);
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(mm.store().rows(), [vec![1.0, 2.0]]);
}

#[test]
fn test_end_to_end_export() {
    let r = Resolution::new(1.0).unwrap();
    let mut mm = Multimeter::new("mm", &r);
    mm.set_parameters(
        &json!({ "interval": 5.0, "record_from": ["a", "b"], "start": 0.0, "stop": 100.0 }),
        &r,
    )
    .unwrap();
    strobe_core::Component::calibrate(&mut mm, &strobe_core::Clock::new(r, 10));

    for (t, values) in [(10, [1.0, 2.0]), (50, [3.0, 4.0]), (90, [5.0, 6.0])] {
        mm.handle_reply(
            1,
            &DataLoggingReply {
                info: vec![DataPoint { timestamp: Time::step(t), data: values.to_vec() }],
            },
        );
    }
    let data = mm.data().unwrap();
    assert_eq!(
        data,
        vec![
            ("a".to_string(), vec![1.0, 3.0, 5.0]),
            ("b".to_string(), vec![2.0, 4.0, 6.0]),
        ]
    );
}

#[test]
fn test_quantity_named_times_keeps_stamps() {
    let mut h = TestHarness::new();
    let mm = h.add_multimeter(json!({ "interval": 5.0, "record_from": ["times"] }));
    let gen = h
        .sim
        .create(
            "Generator",
            &json!({ "signals": { "times": { "kind": "constant", "value": 7.0 } } }),
        )
        .unwrap();
    h.connect(mm, gen);

    h.run_for(30.0);
    let status = h.sim.get_status(mm).unwrap();
    assert_eq!(status["events"]["times"], json!([5.0, 10.0, 15.0, 20.0]));
    assert_eq!(status["events"]["data"], json!([[7.0, 7.0, 7.0, 7.0]]));
    assert_eq!(h.column(mm, "times"), vec![7.0; 4]);
}
