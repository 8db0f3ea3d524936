//! 显微镜注册表
//!
//! 独占持有所有能力记录，每次变更后把完整快照写回存储。写入失败时内存中的
//! 记录恢复到调用前的状态。

use std::cmp::Ordering;
use std::collections::BTreeMap;

use gently_core::models::{
    MicroscopeCapability, MicroscopeStatus, MicroscopeType, RegistrySnapshot,
    WAVELENGTH_TOLERANCE_NM,
};
use gently_core::{GentlyResult, SnapshotStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 列表过滤条件，各条件之间为与关系
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MicroscopeFilter {
    pub microscope_type: Option<MicroscopeType>,
    pub status: Option<MicroscopeStatus>,
    pub capability: Option<String>,
}

impl MicroscopeFilter {
    pub fn matches(&self, microscope: &MicroscopeCapability) -> bool {
        self.microscope_type
            .map_or(true, |t| microscope.microscope_type == t)
            && self.status.map_or(true, |s| microscope.status == s)
            && self
                .capability
                .as_deref()
                .map_or(true, |c| microscope.supports_capability(c))
    }
}

/// 显微镜匹配需求
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRequirements {
    pub microscope_type: Option<MicroscopeType>,
    pub required_capabilities: Vec<String>,
    pub required_wavelengths: Vec<u32>,
    pub required_magnification: Option<u32>,
    /// 只考虑在线的显微镜
    pub only_available: bool,
}

impl Default for CapabilityRequirements {
    fn default() -> Self {
        Self {
            microscope_type: None,
            required_capabilities: Vec::new(),
            required_wavelengths: Vec::new(),
            required_magnification: None,
            only_available: true,
        }
    }
}

impl CapabilityRequirements {
    pub fn is_satisfied_by(&self, microscope: &MicroscopeCapability) -> bool {
        if self.only_available && !microscope.is_online() {
            return false;
        }
        if let Some(microscope_type) = self.microscope_type {
            if microscope.microscope_type != microscope_type {
                return false;
            }
        }
        if !microscope.supports_all(&self.required_capabilities) {
            return false;
        }
        if !self
            .required_wavelengths
            .iter()
            .all(|&wl| microscope.has_wavelength(wl, WAVELENGTH_TOLERANCE_NM))
        {
            return false;
        }
        self.required_magnification
            .map_or(true, |magnification| microscope.has_objective(magnification))
    }
}

/// 注册表统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryStats {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub busy: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// 显微镜注册表
pub struct MicroscopeRegistry {
    microscopes: BTreeMap<String, MicroscopeCapability>,
    store: Box<dyn SnapshotStore<RegistrySnapshot>>,
}

impl MicroscopeRegistry {
    /// 从存储加载注册表，存储为空时得到空注册表
    pub fn open(store: Box<dyn SnapshotStore<RegistrySnapshot>>) -> GentlyResult<Self> {
        let microscopes: BTreeMap<_, _> = store
            .load()?
            .map(|snapshot| snapshot.microscopes)
            .unwrap_or_default()
            .into_iter()
            .map(|microscope| (microscope.microscope_id.clone(), microscope))
            .collect();

        info!("显微镜注册表已加载，共 {} 台", microscopes.len());
        Ok(Self { microscopes, store })
    }

    /// 注册或整体替换一台显微镜，并刷新心跳
    pub fn register(
        &mut self,
        mut microscope: MicroscopeCapability,
    ) -> GentlyResult<MicroscopeCapability> {
        microscope.update_heartbeat();
        let id = microscope.microscope_id.clone();
        let previous = self.microscopes.insert(id.clone(), microscope.clone());

        if let Err(e) = self.persist() {
            self.restore(&id, previous);
            return Err(e);
        }

        info!(
            "显微镜已注册: {} (类型: {}, 状态: {})",
            id, microscope.microscope_type, microscope.status
        );
        Ok(microscope)
    }

    pub fn unregister(&mut self, microscope_id: &str) -> GentlyResult<bool> {
        let Some(previous) = self.microscopes.remove(microscope_id) else {
            warn!("注销失败，显微镜不存在: {}", microscope_id);
            return Ok(false);
        };

        if let Err(e) = self.persist() {
            self.restore(microscope_id, Some(previous));
            return Err(e);
        }

        info!("显微镜已注销: {}", microscope_id);
        Ok(true)
    }

    pub fn get(&self, microscope_id: &str) -> Option<&MicroscopeCapability> {
        self.microscopes.get(microscope_id)
    }

    pub fn list(&self, filter: &MicroscopeFilter) -> Vec<&MicroscopeCapability> {
        let results: Vec<_> = self
            .microscopes
            .values()
            .filter(|microscope| filter.matches(microscope))
            .collect();
        debug!("显微镜列表查询返回 {} 条", results.len());
        results
    }

    pub fn update_status(
        &mut self,
        microscope_id: &str,
        status: MicroscopeStatus,
    ) -> GentlyResult<bool> {
        let updated = self.mutate(microscope_id, |microscope| {
            microscope.status = status;
            microscope.update_heartbeat();
        })?;
        if updated {
            info!("显微镜 {} 状态更新为 {}", microscope_id, status);
        }
        Ok(updated)
    }

    pub fn heartbeat(&mut self, microscope_id: &str) -> GentlyResult<bool> {
        let updated = self.mutate(microscope_id, MicroscopeCapability::update_heartbeat)?;
        if updated {
            debug!("收到显微镜心跳: {}", microscope_id);
        }
        Ok(updated)
    }

    /// 查找满足需求的显微镜，可用率高的在前，相同则完成实验数多的在前
    pub fn find_suitable(&self, requirements: &CapabilityRequirements) -> Vec<&MicroscopeCapability> {
        let mut candidates: Vec<_> = self
            .microscopes
            .values()
            .filter(|microscope| requirements.is_satisfied_by(microscope))
            .collect();

        candidates.sort_by(|a, b| suitability(b, a));

        debug!("匹配到 {} 台候选显微镜", candidates.len());
        candidates
    }

    /// 某类型所有显微镜的审核人邮箱，按首次出现顺序去重
    pub fn reviewer_emails(&self, microscope_type: MicroscopeType) -> Vec<String> {
        let mut emails: Vec<String> = Vec::new();
        for microscope in self
            .microscopes
            .values()
            .filter(|microscope| microscope.microscope_type == microscope_type)
        {
            for reviewer in &microscope.reviewers {
                if !emails.contains(&reviewer.email) {
                    emails.push(reviewer.email.clone());
                }
            }
        }
        emails
    }

    pub fn count_by_status(&self, status: MicroscopeStatus) -> usize {
        self.microscopes
            .values()
            .filter(|microscope| microscope.status == status)
            .count()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut by_type = BTreeMap::new();
        for microscope in self.microscopes.values() {
            *by_type
                .entry(microscope.microscope_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        RegistryStats {
            total: self.microscopes.len(),
            online: self.count_by_status(MicroscopeStatus::Online),
            offline: self.count_by_status(MicroscopeStatus::Offline),
            busy: self.count_by_status(MicroscopeStatus::Busy),
            by_type,
        }
    }

    pub fn len(&self) -> usize {
        self.microscopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.microscopes.is_empty()
    }

    fn mutate<F>(&mut self, microscope_id: &str, apply: F) -> GentlyResult<bool>
    where
        F: FnOnce(&mut MicroscopeCapability),
    {
        let Some(microscope) = self.microscopes.get_mut(microscope_id) else {
            warn!("显微镜不存在: {}", microscope_id);
            return Ok(false);
        };
        let previous = microscope.clone();
        apply(microscope);

        if let Err(e) = self.persist() {
            self.restore(microscope_id, Some(previous));
            return Err(e);
        }
        Ok(true)
    }

    fn restore(&mut self, microscope_id: &str, previous: Option<MicroscopeCapability>) {
        match previous {
            Some(microscope) => {
                self.microscopes.insert(microscope_id.to_string(), microscope);
            }
            None => {
                self.microscopes.remove(microscope_id);
            }
        }
    }

    fn persist(&self) -> GentlyResult<()> {
        let snapshot = RegistrySnapshot::new(self.microscopes.values().cloned().collect());
        self.store.save(&snapshot)
    }
}

fn suitability(a: &MicroscopeCapability, b: &MicroscopeCapability) -> Ordering {
    a.uptime_score()
        .total_cmp(&b.uptime_score())
        .then(a.metrics.experiments_completed.cmp(&b.metrics.experiments_completed))
}
