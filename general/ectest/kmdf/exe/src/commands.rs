// Copyright (c) Microsoft Corporation
// License: MIT OR Apache-2.0

use anyhow::{Context, Result};
use ectest_shared::{
    battery::{BixData, BstData, BIX_METHOD, BST_METHOD, BTP_METHOD, UNKNOWN_VALUE},
    eval::MethodArgument,
    fan::{
        fan_level_for_rpm,
        FanInfo,
        FanPerformanceStates,
        FanStatus,
        FanThreshold,
        ACTIVE_COOLING_METHODS,
        FIF_METHOD,
        FPS_METHOD,
        FSL_METHOD,
        FST_METHOD,
    },
    notify::describe_notify_code,
    rtc::{
        AcpiTime,
        AlarmTimerSeconds,
        TimeAlarmCapabilities,
        TimerId,
        TimerStatus,
        WakePolicy,
        GCP_METHOD,
        GRT_METHOD,
        GWS_METHOD,
        TIP_METHOD,
        TIV_METHOD,
    },
    thermal::{decode_celsius, CRT_METHOD, PSV_METHOD},
};
use tracing::{debug, info, warn};

use crate::{cli::method_path, device::EcTestDevice};

pub fn eval(device: &EcTestDevice, path: &str, integers: &[u64], strings: &[String]) -> Result<()> {
    let arguments: Vec<MethodArgument<'_>> = integers
        .iter()
        .copied()
        .map(MethodArgument::Integer)
        .chain(strings.iter().map(|s| MethodArgument::String(s.as_str())))
        .collect();

    let values = device.eval(path, &arguments)?;
    if values.is_empty() {
        println!("{path}: no result");
    }
    for value in values {
        println!("{path}: {value}");
    }
    Ok(())
}

fn capacity(value: u32, unit: &str) -> String {
    if value == UNKNOWN_VALUE {
        "unknown".to_owned()
    } else {
        format!("{value} {unit}")
    }
}

pub fn battery(device: &EcTestDevice, scope: Option<&str>) -> Result<()> {
    let bst_path = method_path(scope, BST_METHOD);
    let bst = BstData::decode(&device.eval(&bst_path, &[])?)
        .with_context(|| format!("{bst_path} returned an unexpected object"))?;
    let bix_path = method_path(scope, BIX_METHOD);
    let bix = BixData::decode(&device.eval(&bix_path, &[])?)
        .with_context(|| format!("{bix_path} returned an unexpected object"))?;

    let capacity_unit = bix.power_unit.capacity_unit();
    let rate_unit = bix.power_unit.rate_unit();

    println!("Battery {} {} ({})", bix.oem_info, bix.model_number, bix.serial_number);
    println!("  state               {}", bst.state);
    match bix.charge_percent(&bst) {
        Some(percent) => println!("  charge              {percent}%"),
        None => println!("  charge              unknown"),
    }
    println!("  remaining capacity  {}", capacity(bst.remaining_capacity, capacity_unit));
    println!("  present rate        {}", capacity(bst.present_rate, rate_unit));
    println!("  present voltage     {}", capacity(bst.present_voltage, "mV"));
    println!("  design capacity     {}", capacity(bix.design_capacity, capacity_unit));
    println!(
        "  last full charge    {}",
        capacity(bix.last_full_charge_capacity, capacity_unit)
    );
    println!("  design voltage      {}", capacity(bix.design_voltage, "mV"));
    println!("  cycle count         {}", capacity(bix.cycle_count, "cycles"));
    println!("  technology          {}", bix.technology);
    println!("  type                {}", bix.battery_type);
    if let Some(swapping) = bix.swapping_capability {
        println!("  swapping            {swapping}");
    }
    Ok(())
}

pub fn trip_point(device: &EcTestDevice, scope: Option<&str>, trip_point: u32) -> Result<()> {
    let path = method_path(scope, BTP_METHOD);
    device.eval(&path, &[MethodArgument::Integer(trip_point.into())])?;
    if trip_point == 0 {
        info!("cleared battery trip point");
    } else {
        info!("battery trip point set to {trip_point}");
    }
    Ok(())
}

pub fn rtc(device: &EcTestDevice, scope: Option<&str>) -> Result<()> {
    let path = method_path(scope, GCP_METHOD);
    let capabilities = TimeAlarmCapabilities::decode(&device.eval(&path, &[])?)
        .with_context(|| format!("{path} returned an unexpected object"))?;
    let names: Vec<&str> = capabilities.names().collect();
    println!("Capabilities  {:#06X} [{}]", capabilities.0, names.join(", "));

    if capabilities.contains(TimeAlarmCapabilities::REAL_TIME) {
        let path = method_path(scope, GRT_METHOD);
        let time = AcpiTime::decode(&device.eval(&path, &[])?)
            .with_context(|| format!("{path} returned an unexpected object"))?;
        println!("Real time     {time}");
        if !time.valid {
            warn!("firmware reports the real time as not valid");
        }
    }

    for timer in TimerId::ALL {
        let argument = [timer.argument()];

        let path = method_path(scope, TIV_METHOD);
        let value = AlarmTimerSeconds::decode(&device.eval(&path, &argument)?)
            .with_context(|| format!("{path} returned an unexpected object"))?;

        let path = method_path(scope, TIP_METHOD);
        let policy = WakePolicy::decode(&device.eval(&path, &argument)?)
            .with_context(|| format!("{path} returned an unexpected object"))?;

        println!("{timer} timer");
        println!("  value         {value}");
        println!("  wake policy   {policy}");

        if capabilities.contains(TimeAlarmCapabilities::WAKE_STATUS) {
            let path = method_path(scope, GWS_METHOD);
            let status = TimerStatus::decode(&device.eval(&path, &argument)?)
                .with_context(|| format!("{path} returned an unexpected object"))?;
            println!("  status        {status}");
        }
    }
    Ok(())
}

pub fn temperature(device: &EcTestDevice, path: &str) -> Result<()> {
    let celsius = decode_celsius(&device.eval(path, &[])?)
        .with_context(|| format!("{path} returned an unexpected object"))?;
    println!("{path}: {celsius:.1} C");

    // Thresholds only exist next to `_TMP`, and not every zone has them.
    let scope = match path.strip_suffix("_TMP") {
        Some("") => Some(None),
        Some(prefix) => prefix.strip_suffix('.').map(Some),
        None => None,
    };
    if let Some(scope) = scope {
        for method in [PSV_METHOD, CRT_METHOD] {
            let threshold_path = method_path(scope, method);
            match device.eval(&threshold_path, &[]).map(|values| decode_celsius(&values)) {
                Ok(Ok(celsius)) => println!("{threshold_path}: {celsius:.1} C"),
                Ok(Err(err)) => warn!("{threshold_path}: {err}"),
                Err(err) => debug!("{threshold_path} not available: {err:#}"),
            }
        }
    }
    Ok(())
}

pub fn fan(
    device: &EcTestDevice,
    scope: Option<&str>,
    zone: Option<&str>,
    set_rpm: Option<u32>,
) -> Result<()> {
    let path = method_path(scope, FPS_METHOD);
    let states = FanPerformanceStates::decode(&device.eval(&path, &[])?)
        .with_context(|| format!("{path} returned an unexpected object"))?;

    if let Some(rpm) = set_rpm {
        let path = method_path(scope, FIF_METHOD);
        let info = FanInfo::decode(&device.eval(&path, &[])?)
            .with_context(|| format!("{path} returned an unexpected object"))?;
        let level = fan_level_for_rpm(&info, &states, rpm)
            .context("the fan lists no performance states to pick from")?;
        let path = method_path(scope, FSL_METHOD);
        device.eval(&path, &[level])?;
        info!("asked the fan for {rpm} rpm with {level:?}");
    }

    let path = method_path(scope, FST_METHOD);
    let status = FanStatus::decode(&device.eval(&path, &[])?)
        .with_context(|| format!("{path} returned an unexpected object"))?;
    match status.speed_rpm {
        Some(rpm) => println!("Fan speed     {rpm} rpm"),
        None => println!("Fan speed     unknown"),
    }
    println!("Control       {}", status.control);
    if let (Some(min), Some(max)) = (states.min_rpm(), states.max_rpm()) {
        println!("Speed range   {min} - {max} rpm");
    }
    for state in &states.states {
        let trip_point = state
            .trip_point
            .map_or_else(|| "none".to_owned(), |index| format!("_AC{index}"));
        println!(
            "  control {:>3}  {:>5} rpm  trip point {trip_point}",
            state.control, state.speed_rpm
        );
    }

    // Trip points are defined from _AC0 up without gaps.
    let mut thresholds = Vec::new();
    for method in ACTIVE_COOLING_METHODS {
        let path = method_path(zone, method);
        match device.eval(&path, &[]).map(|values| decode_celsius(&values)) {
            Ok(Ok(celsius)) => thresholds.push((path, celsius)),
            Ok(Err(err)) => {
                warn!("{path}: {err}");
                break;
            }
            Err(err) => {
                debug!("{path} not available: {err:#}");
                break;
            }
        }
    }
    let count = thresholds.len();
    for (index, (path, celsius)) in thresholds.into_iter().enumerate() {
        let role = FanThreshold::for_trip_point(index, count);
        println!("{path}: {celsius:.1} C ({role})");
    }
    Ok(())
}

pub fn notifications(device: &EcTestDevice, count: Option<u32>) -> Result<()> {
    info!("waiting for notifications on {}", device.path());
    let mut received = 0u32;
    while count.is_none_or(|count| received < count) {
        let code = device.wait_notification()?;
        received = received.saturating_add(1);
        println!("Notify {code:#04X} ({})", describe_notify_code(code));
    }
    Ok(())
}

pub fn stats(device: &EcTestDevice) -> Result<()> {
    let stats = device.query_stats()?;
    println!("received   {}", stats.received);
    println!("delivered  {}", stats.delivered);
    println!("dropped    {}", stats.dropped);
    println!("queued     {}", stats.queued);
    Ok(())
}
