use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;
use crate::errors::{GentlyError, GentlyResult};

/// 光源波长匹配的默认容差（纳米）
pub const WAVELENGTH_TOLERANCE_NM: u32 = 10;

/// 显微镜运行状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MicroscopeStatus {
    Online,
    #[default]
    Offline,
    Maintenance,
    Busy,
    Reserved,
}

impl MicroscopeStatus {
    pub const ALL: [MicroscopeStatus; 5] = [
        MicroscopeStatus::Online,
        MicroscopeStatus::Offline,
        MicroscopeStatus::Maintenance,
        MicroscopeStatus::Busy,
        MicroscopeStatus::Reserved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MicroscopeStatus::Online => "online",
            MicroscopeStatus::Offline => "offline",
            MicroscopeStatus::Maintenance => "maintenance",
            MicroscopeStatus::Busy => "busy",
            MicroscopeStatus::Reserved => "reserved",
        }
    }
}

impl FromStr for MicroscopeStatus {
    type Err = GentlyError;

    fn from_str(s: &str) -> GentlyResult<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                GentlyError::unknown_variant(
                    "显微镜状态",
                    s,
                    &Self::ALL.map(|status| status.as_str()),
                )
            })
    }
}

impl fmt::Display for MicroscopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 显微镜类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MicroscopeType {
    #[serde(rename = "widefield")]
    Widefield,
    #[serde(rename = "confocal")]
    Confocal,
    #[serde(rename = "two_photon")]
    TwoPhoton,
    #[serde(rename = "light_sheet")]
    LightSheet,
    #[serde(rename = "super_resolution")]
    SuperResolution,
    #[serde(rename = "spinning_disk")]
    SpinningDisk,
    #[serde(rename = "DiSPIM")]
    DiSpim,
}

impl MicroscopeType {
    pub const ALL: [MicroscopeType; 7] = [
        MicroscopeType::Widefield,
        MicroscopeType::Confocal,
        MicroscopeType::TwoPhoton,
        MicroscopeType::LightSheet,
        MicroscopeType::SuperResolution,
        MicroscopeType::SpinningDisk,
        MicroscopeType::DiSpim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MicroscopeType::Widefield => "widefield",
            MicroscopeType::Confocal => "confocal",
            MicroscopeType::TwoPhoton => "two_photon",
            MicroscopeType::LightSheet => "light_sheet",
            MicroscopeType::SuperResolution => "super_resolution",
            MicroscopeType::SpinningDisk => "spinning_disk",
            MicroscopeType::DiSpim => "DiSPIM",
        }
    }
}

impl FromStr for MicroscopeType {
    type Err = GentlyError;

    fn from_str(s: &str) -> GentlyResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                GentlyError::unknown_variant("显微镜类型", s, &Self::ALL.map(|kind| kind.as_str()))
            })
    }
}

impl fmt::Display for MicroscopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_immersion() -> String {
    "air".to_string()
}

/// 物镜规格
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Objective {
    pub magnification: u32,
    pub numerical_aperture: f64,
    #[serde(default = "default_immersion")]
    pub immersion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_distance_mm: Option<f64>,
}

/// 光源规格
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LightSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub wavelengths: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_power_mw: Option<f64>,
}

/// 相机/探测器规格
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detector {
    #[serde(rename = "type")]
    pub detector_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_size_um: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_x: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_y: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantum_efficiency: Option<f64>,
}

/// 滤光片组
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterSet {
    pub name: String,
    pub excitation: u32,
    pub emission: u32,
    #[serde(default)]
    pub fluorophores: Vec<String>,
}

/// 环境控制舱
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentalChamber {
    pub available: bool,
    pub temperature_control: bool,
    pub co2_control: bool,
    pub humidity_control: bool,
}

/// 显微镜硬件描述
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Hardware {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub objectives: Vec<Objective>,
    pub light_sources: Vec<LightSource>,
    pub detectors: Vec<Detector>,
    pub filter_sets: Vec<FilterSet>,
    pub environmental_chamber: EnvironmentalChamber,
}

/// 预约时间窗配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulingConfig {
    pub weekday_start: String,
    pub weekday_end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekend_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekend_end: Option<String>,
    pub max_booking_duration_hours: f64,
    pub min_booking_duration_hours: f64,
    pub advance_booking_days: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            weekday_start: "08:00".to_string(),
            weekday_end: "18:00".to_string(),
            weekend_start: None,
            weekend_end: None,
            max_booking_duration_hours: 8.0,
            min_booking_duration_hours: 0.5,
            advance_booking_days: 14,
        }
    }
}

/// 联系人
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// 运行指标
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_percentage: Option<f64>,
    pub experiments_completed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_queue_time_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_maintenance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_maintenance: Option<String>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// 物理位置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// 显微镜能力声明
///
/// 用于实验路由和调度，由注册表独占持有。每次经注册表的变更调用都会刷新
/// `last_heartbeat`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MicroscopeCapability {
    pub microscope_id: String,
    #[serde(rename = "type")]
    pub microscope_type: MicroscopeType,
    #[serde(default)]
    pub status: MicroscopeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_contact: Option<Contact>,
    #[serde(default)]
    pub reviewers: Vec<Contact>,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize_option"
    )]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub registered_at: DateTime<Utc>,
}

impl MicroscopeCapability {
    /// 创建一台离线、无硬件描述的显微镜
    pub fn new<S: Into<String>>(microscope_id: S, microscope_type: MicroscopeType) -> Self {
        Self {
            microscope_id: microscope_id.into(),
            microscope_type,
            status: MicroscopeStatus::Offline,
            name: None,
            location: None,
            capabilities: Vec::new(),
            hardware: Hardware::default(),
            scheduling: SchedulingConfig::default(),
            primary_contact: None,
            reviewers: Vec::new(),
            metrics: Metrics::default(),
            last_heartbeat: None,
            registered_at: Utc::now(),
        }
    }

    pub fn update_heartbeat(&mut self) {
        self.last_heartbeat = Some(Utc::now());
    }

    pub fn is_online(&self) -> bool {
        matches!(self.status, MicroscopeStatus::Online)
    }

    pub fn supports_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// 所有要求的能力标签都必须存在
    pub fn supports_all<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|capability| self.supports_capability(capability.as_ref()))
    }

    pub fn supports_any<S: AsRef<str>>(&self, candidates: &[S]) -> bool {
        candidates
            .iter()
            .any(|capability| self.supports_capability(capability.as_ref()))
    }

    /// 任一光源存在与目标波长相差不超过 `tolerance` 纳米的谱线
    pub fn has_wavelength(&self, wavelength: u32, tolerance: u32) -> bool {
        self.hardware
            .light_sources
            .iter()
            .flat_map(|source| source.wavelengths.iter())
            .any(|wl| wl.abs_diff(wavelength) <= tolerance)
    }

    pub fn has_objective(&self, magnification: u32) -> bool {
        self.hardware
            .objectives
            .iter()
            .any(|objective| objective.magnification == magnification)
    }

    /// 检查心跳是否超时；从未上报心跳视为超时
    pub fn is_heartbeat_expired(&self, timeout_seconds: i64) -> bool {
        match self.last_heartbeat {
            Some(at) => (Utc::now() - at).num_seconds() > timeout_seconds,
            None => true,
        }
    }

    /// 排序用的可用率，缺失时按0计
    pub fn uptime_score(&self) -> f64 {
        self.metrics.uptime_percentage.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confocal() -> MicroscopeCapability {
        let mut microscope = MicroscopeCapability::new("confocal-001", MicroscopeType::Confocal);
        microscope.capabilities = vec!["3d_imaging".to_string(), "fixed_cell".to_string()];
        microscope.hardware.light_sources = vec![LightSource {
            source_type: "laser".to_string(),
            wavelengths: vec![405, 485, 561],
            max_power_mw: None,
        }];
        microscope.hardware.objectives = vec![Objective {
            magnification: 63,
            numerical_aperture: 1.4,
            immersion: "oil".to_string(),
            working_distance_mm: None,
        }];
        microscope
    }

    #[test]
    fn test_wavelength_tolerance() {
        let microscope = confocal();
        assert!(microscope.has_wavelength(488, WAVELENGTH_TOLERANCE_NM));
        assert!(microscope.has_wavelength(571, WAVELENGTH_TOLERANCE_NM));
        assert!(!microscope.has_wavelength(450, WAVELENGTH_TOLERANCE_NM));
        assert!(!microscope.has_wavelength(640, WAVELENGTH_TOLERANCE_NM));
    }

    #[test]
    fn test_capability_predicates() {
        let microscope = confocal();
        assert!(microscope.supports_all(&["3d_imaging"]));
        assert!(!microscope.supports_all(&["3d_imaging", "live_cell"]));
        assert!(microscope.supports_any(&["live_cell", "fixed_cell"]));
        assert!(microscope.supports_all::<&str>(&[]));
        assert!(microscope.has_objective(63));
        assert!(!microscope.has_objective(40));
    }

    #[test]
    fn test_type_string_values() {
        assert_eq!("DiSPIM".parse::<MicroscopeType>().unwrap(), MicroscopeType::DiSpim);
        assert_eq!(
            serde_json::to_value(MicroscopeType::TwoPhoton).unwrap(),
            serde_json::json!("two_photon")
        );
        assert!("dispim".parse::<MicroscopeType>().unwrap_err().is_validation());
        assert!("sleeping".parse::<MicroscopeStatus>().unwrap_err().is_validation());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let microscope: MicroscopeCapability = serde_json::from_value(serde_json::json!({
            "microscope_id": "wf-1",
            "type": "widefield"
        }))
        .unwrap();

        assert_eq!(microscope.status, MicroscopeStatus::Offline);
        assert_eq!(microscope.scheduling.weekday_start, "08:00");
        assert_eq!(microscope.metrics.experiments_completed, 0);
        assert!(microscope.hardware.objectives.is_empty());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_value::<MicroscopeCapability>(serde_json::json!({
            "microscope_id": "x",
            "type": "electron"
        }));
        let err = GentlyError::from(result.unwrap_err());
        assert!(err.is_validation());
    }

    #[test]
    fn test_serialization_omits_absent_optionals() {
        let value = serde_json::to_value(confocal()).unwrap();
        assert!(value.get("name").is_none());
        assert!(value.get("last_heartbeat").is_none());
        assert_eq!(value["type"], "confocal");
        assert_eq!(value["status"], "offline");
    }

    #[test]
    fn test_heartbeat_expiry() {
        let mut microscope = confocal();
        assert!(microscope.is_heartbeat_expired(60));
        microscope.update_heartbeat();
        assert!(!microscope.is_heartbeat_expired(60));
    }
}
