// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Walks the buffers of a battery query the way they travel between the test
//! app, the driver and the ACPI bus driver.

use ectest_shared::{
    battery::{BatteryState, BstData, BST_METHOD, BTP_METHOD},
    eval::{
        encode_eval_input,
        required_output_length,
        validate_eval_input,
        AcpiValue,
        EvalOutput,
        MethodArgument,
        OUTPUT_HEADER_LEN,
    },
    ioctl::{Ioctl, IOCTL_ACPI_EVAL_METHOD_EX},
    rtc::{TimerId, TIV_METHOD},
};

fn driver_accepts(code: u32, input: &[u8]) -> Vec<u8> {
    let ioctl = Ioctl::from_code(code).expect("known ioctl");
    assert!(ioctl.is_acpi_eval());
    let request = validate_eval_input(ioctl, input).expect("valid input");
    request.path.to_vec()
}

#[test]
fn bst_query_is_forwarded_and_decoded() {
    let mut input = [0u8; 512];
    let path = format!("BAT0.{BST_METHOD}");
    let len = encode_eval_input(&path, &[], &mut input).unwrap();
    assert_eq!(driver_accepts(IOCTL_ACPI_EVAL_METHOD_EX, &input[..len]), b"BAT0._BST");

    let returned = AcpiValue::encode_output(&[AcpiValue::Package(vec![
        AcpiValue::Integer(2),
        AcpiValue::Integer(1500),
        AcpiValue::Integer(4200),
        AcpiValue::Integer(12100),
    ])]);

    // First attempt with a header sized buffer only learns the length.
    let header = &returned[..OUTPUT_HEADER_LEN];
    assert_eq!(required_output_length(header), Ok(returned.len()));
    assert!(EvalOutput::parse(header).is_err());

    let values = EvalOutput::parse(&returned).unwrap().values().unwrap();
    let bst = BstData::decode(&values).unwrap();
    assert!(bst.state.contains(BatteryState::CHARGING));
    assert_eq!(bst.remaining_capacity, 4200);
}

#[test]
fn methods_with_arguments_use_the_complex_layout() {
    let mut input = [0u8; 512];
    let len = encode_eval_input(BTP_METHOD, &[MethodArgument::Integer(3000)], &mut input).unwrap();
    assert_eq!(driver_accepts(IOCTL_ACPI_EVAL_METHOD_EX, &input[..len]), b"_BTP");

    let len = encode_eval_input(TIV_METHOD, &[TimerId::DcPower.argument()], &mut input).unwrap();
    let request = validate_eval_input(Ioctl::AcpiEvalMethodEx, &input[..len]).unwrap();
    assert_eq!(request.argument_count, 1);
}

#[test]
fn driver_refuses_garbage() {
    let garbage = [0x5Au8; 300];
    assert!(validate_eval_input(Ioctl::AcpiEvalMethodEx, &garbage).is_err());
    assert!(validate_eval_input(Ioctl::AcpiEvalMethod, &garbage[..3]).is_err());
}
