/*!
 * Windows Telemetry
 *
 * - Intel Power Gadget energy library, loaded from `%IPG_Dir%`
 * - `GetSystemPowerStatus` for the system battery
 * - `NtQueryTimerResolution` for the current timer interval
 */

use crate::core::errors::{SourceError, SourceResult};
use crate::core::limits::{MSR_NAME_CAPACITY, TIMER_UNITS_TO_MS};
use crate::telemetry::battery::{BatteryProbe, BatteryReading, PowerState};
use crate::telemetry::cpu_power::{EnergyReader, MsrFunction, MsrReading};
use crate::telemetry::timer::TimerClock;
use std::ffi::c_void;
use std::path::PathBuf;
use tracing::trace;
use windows_sys::Win32::Foundation::FreeLibrary;
use windows_sys::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows_sys::Win32::System::Power::{GetSystemPowerStatus, SYSTEM_POWER_STATUS};

// =============================================================================
// ENERGY LIBRARY
// =============================================================================

#[cfg(target_pointer_width = "64")]
const ENERGY_LIB: &str = "EnergyLib64.dll";
#[cfg(not(target_pointer_width = "64"))]
const ENERGY_LIB: &str = "EnergyLib32.dll";

type InitializeFn = unsafe extern "C" fn() -> bool;
type GetNumMsrsFn = unsafe extern "C" fn(*mut i32) -> bool;
type GetMsrNameFn = unsafe extern "C" fn(i32, *mut u16) -> bool;
type GetMsrFuncFn = unsafe extern "C" fn(i32, *mut i32) -> bool;
type GetPowerDataFn = unsafe extern "C" fn(i32, i32, *mut f64, *mut i32) -> bool;
type ReadSampleFn = unsafe extern "C" fn() -> bool;
type GetMaxTemperatureFn = unsafe extern "C" fn(i32, *mut i32) -> bool;

struct EnergyLib {
    module: *mut c_void,
    get_num_msrs: GetNumMsrsFn,
    get_msr_name: GetMsrNameFn,
    get_msr_func: GetMsrFuncFn,
    get_power_data: GetPowerDataFn,
    read_sample: ReadSampleFn,
}

// SAFETY: the library's entry points are called from one thread at a time
// (the sampling thread owns the reader)
unsafe impl Send for EnergyLib {}

impl Drop for EnergyLib {
    fn drop(&mut self) {
        // SAFETY: module came from LoadLibraryW and is freed exactly once
        unsafe {
            FreeLibrary(self.module);
        }
    }
}

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Look up an export and reinterpret it as `F`
///
/// # Safety
/// `F` must be the export's true function pointer type.
unsafe fn export<F: Copy>(module: *mut c_void, name: &str) -> Option<F> {
    let cname = format!("{}\0", name);
    let proc = GetProcAddress(module, cname.as_ptr())?;
    Some(std::mem::transmute_copy(&proc))
}

/// CPU energy data from the Intel Power Gadget library
pub struct PowerGadgetReader {
    lib: Option<EnergyLib>,
    max_temperature: f64,
}

impl PowerGadgetReader {
    pub fn new() -> Self {
        Self {
            lib: None,
            max_temperature: 0.0,
        }
    }

    fn load() -> SourceResult<(EnergyLib, InitializeFn, Option<GetMaxTemperatureFn>)> {
        let dir = std::env::var_os("IPG_Dir")
            .ok_or_else(|| SourceError::unavailable("IPG_Dir is not set"))?;
        let path = PathBuf::from(dir).join(ENERGY_LIB);
        let wide_path = wide(&path.to_string_lossy());

        // SAFETY: wide_path is NUL-terminated
        let module = unsafe { LoadLibraryW(wide_path.as_ptr()) };
        if module.is_null() {
            return Err(SourceError::unavailable(format!(
                "cannot load {}",
                path.display()
            )));
        }

        // SAFETY: the types match the energy library's documented exports
        let lookup = unsafe {
            (
                export::<InitializeFn>(module, "IntelEnergyLibInitialize"),
                export::<GetNumMsrsFn>(module, "GetNumMsrs"),
                export::<GetMsrNameFn>(module, "GetMsrName"),
                export::<GetMsrFuncFn>(module, "GetMsrFunc"),
                export::<GetPowerDataFn>(module, "GetPowerData"),
                export::<ReadSampleFn>(module, "ReadSample"),
                export::<GetMaxTemperatureFn>(module, "GetMaxTemperature"),
            )
        };

        match lookup {
            (
                Some(initialize),
                Some(get_num_msrs),
                Some(get_msr_name),
                Some(get_msr_func),
                Some(get_power_data),
                Some(read_sample),
                get_max_temperature,
            ) => Ok((
                EnergyLib {
                    module,
                    get_num_msrs,
                    get_msr_name,
                    get_msr_func,
                    get_power_data,
                    read_sample,
                },
                initialize,
                get_max_temperature,
            )),
            _ => {
                // SAFETY: module is not used after this point
                unsafe {
                    FreeLibrary(module);
                }
                Err(SourceError::unavailable("energy library is missing exports"))
            }
        }
    }
}

impl Default for PowerGadgetReader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyReader for PowerGadgetReader {
    fn initialize(&mut self) -> SourceResult<()> {
        let (lib, initialize, get_max_temperature) = Self::load()?;

        // SAFETY: entry points resolved from the loaded library
        if !unsafe { initialize() } {
            // Dropping lib unloads the library
            return Err(SourceError::unavailable("energy library failed to initialize"));
        }

        if let Some(get_max_temperature) = get_max_temperature {
            let mut degrees = 0i32;
            // SAFETY: valid out-pointer
            if unsafe { get_max_temperature(0, &mut degrees) } {
                self.max_temperature = degrees as f64;
            }
        }

        trace!(max_temperature = self.max_temperature, "Energy library initialized");
        self.lib = Some(lib);
        Ok(())
    }

    fn max_temperature(&self) -> f64 {
        self.max_temperature
    }

    fn read(&mut self) -> SourceResult<Vec<MsrReading>> {
        let lib = self
            .lib
            .as_ref()
            .ok_or_else(|| SourceError::unavailable("energy library not loaded"))?;

        let mut count = 0i32;
        let mut readings = Vec::new();
        // SAFETY: entry points resolved from the loaded library; every
        // pointer passed refers to a live local of the expected size
        unsafe {
            (lib.get_num_msrs)(&mut count);
            (lib.read_sample)();

            for msr in 0..count {
                let mut function = 0i32;
                let mut name = [0u16; MSR_NAME_CAPACITY];
                (lib.get_msr_func)(msr, &mut function);
                (lib.get_msr_name)(msr, name.as_mut_ptr());

                let mut data = [0f64; 3];
                let mut filled = 0i32;
                (lib.get_power_data)(0, msr, data.as_mut_ptr(), &mut filled);

                let len = name.iter().position(|&c| c == 0).unwrap_or(name.len());
                readings.push(MsrReading::new(
                    String::from_utf16_lossy(&name[..len]),
                    MsrFunction::from_id(function),
                    data,
                ));
            }
        }
        Ok(readings)
    }
}

// =============================================================================
// BATTERY
// =============================================================================

const AC_LINE_ONLINE: u8 = 1;
const AC_LINE_OFFLINE: u8 = 0;
const BATTERY_FLAG_CHARGING: u8 = 8;
const BATTERY_FLAG_NO_BATTERY: u8 = 128;
const BATTERY_FLAG_UNKNOWN: u8 = 255;
const BATTERY_PERCENT_UNKNOWN: u8 = 255;

/// System battery via `GetSystemPowerStatus`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPowerProbe;

impl BatteryProbe for SystemPowerProbe {
    fn batteries(&mut self) -> SourceResult<Vec<BatteryReading>> {
        // SAFETY: plain-old-data out-parameter
        let mut status: SYSTEM_POWER_STATUS = unsafe { std::mem::zeroed() };
        if unsafe { GetSystemPowerStatus(&mut status) } == 0 {
            return Err(SourceError::read_failed(
                std::io::Error::last_os_error().to_string(),
            ));
        }

        if status.BatteryFlag == BATTERY_FLAG_NO_BATTERY
            || status.BatteryFlag == BATTERY_FLAG_UNKNOWN
            || status.BatteryLifePercent == BATTERY_PERCENT_UNKNOWN
        {
            return Ok(Vec::new());
        }

        let mut power_state = PowerState::NONE;
        if status.BatteryFlag & BATTERY_FLAG_CHARGING != 0 {
            power_state = power_state | PowerState::CHARGING;
        }
        if status.ACLineStatus == AC_LINE_OFFLINE {
            power_state = power_state | PowerState::DISCHARGING;
        }
        if status.ACLineStatus == AC_LINE_ONLINE {
            power_state = power_state | PowerState::ON_LINE;
        }

        Ok(vec![BatteryReading {
            power_state,
            capacity: status.BatteryLifePercent as u32,
            full_charged_capacity: 100,
            rate: None,
            relative_capacity: true,
            system_battery: true,
        }])
    }
}

// =============================================================================
// TIMER RESOLUTION
// =============================================================================

#[link(name = "ntdll")]
extern "system" {
    fn NtQueryTimerResolution(minimum: *mut u32, maximum: *mut u32, current: *mut u32) -> i32;
}

/// Current timer interval via `NtQueryTimerResolution`
#[derive(Debug, Clone, Copy, Default)]
pub struct NtTimerClock;

impl TimerClock for NtTimerClock {
    fn resolution_ms(&mut self) -> SourceResult<f64> {
        let (mut minimum, mut maximum, mut current) = (0u32, 0u32, 0u32);
        // SAFETY: three valid out-pointers
        let status = unsafe { NtQueryTimerResolution(&mut minimum, &mut maximum, &mut current) };
        if status != 0 {
            return Err(SourceError::read_failed(format!(
                "NtQueryTimerResolution status {:08x}",
                status
            )));
        }
        Ok(current as f64 * TIMER_UNITS_TO_MS)
    }
}
