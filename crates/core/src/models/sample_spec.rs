//! 样本规格（sample specification）访问工具
//!
//! 样本规格是一棵无固定模式的有序键值树，持久化时原样保存。只有生物学检索和
//! 摘要投影需要读取其中的字段，因此这里只提供按路径取值的只读访问器，不做
//! 任何结构校验。缺失的节点一律视为空。

use serde_json::{Map, Value};

/// 样本规格：字符串键到任意 JSON 值的有序映射
pub type SampleSpec = Map<String, Value>;

pub const BIOLOGICAL_CONTEXT: &str = "biological_context";
pub const STAINING_PROTOCOL: &str = "staining_protocol";
pub const IMAGING_PARAMETERS: &str = "imaging_parameters";
pub const TREATMENTS: &str = "treatments";
pub const SAMPLE_PREPARATION: &str = "sample_preparation";

/// 样本规格上的只读视图
#[derive(Debug, Clone, Copy)]
pub struct SpecView<'a> {
    spec: &'a SampleSpec,
}

impl<'a> SpecView<'a> {
    pub fn new(spec: &'a SampleSpec) -> Self {
        Self { spec }
    }

    /// 取顶层小节；缺失或不是对象时返回 `None`
    pub fn section(&self, name: &str) -> Option<&'a Map<String, Value>> {
        self.spec.get(name).and_then(Value::as_object)
    }

    /// 取 `section.field` 的原始值，空值视为缺失
    pub fn field(&self, section: &str, field: &str) -> Option<&'a Value> {
        self.section(section)
            .and_then(|s| s.get(field))
            .filter(|v| !v.is_null())
    }

    /// 取 `section.field` 的文本形式，非字符串标量按 JSON 文本呈现
    pub fn text(&self, section: &str, field: &str) -> Option<String> {
        self.field(section, field).map(value_text)
    }

    /// 取 `section.field` 下的字符串列表
    pub fn strings(&self, section: &str, field: &str) -> Vec<String> {
        self.field(section, field)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter(|v| !v.is_null()).map(value_text).collect())
            .unwrap_or_default()
    }

    /// 取 `section.list[*].key`，例如所有荧光蛋白的 `name`；缺失的键计为空串
    pub fn names_in(&self, section: &str, list: &str, key: &str) -> Vec<String> {
        self.field(section, list)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| item.get(key).map(value_text).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 取 `section.field.enabled` 标志，缺失时为 false
    pub fn enabled(&self, section: &str, field: &str) -> bool {
        self.field(section, field)
            .and_then(|v| v.get("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn fluorescent_protein_names(&self) -> Vec<String> {
        self.names_in(STAINING_PROTOCOL, "fluorescent_proteins", "name")
    }

    pub fn antibody_targets(&self) -> Vec<String> {
        self.names_in(STAINING_PROTOCOL, "primary_antibodies", "target")
    }

    /// 二抗荧光基团与荧光蛋白名称的并集（先二抗后荧光蛋白）
    pub fn fluorophores(&self) -> Vec<String> {
        let mut names = self.names_in(STAINING_PROTOCOL, "secondary_antibodies", "fluorophore");
        names.extend(self.fluorescent_protein_names());
        names
    }

    pub fn compound_names(&self) -> Vec<String> {
        self.names_in(TREATMENTS, "compounds", "name")
    }

    pub fn genetic_modifications(&self) -> Vec<String> {
        self.strings(BIOLOGICAL_CONTEXT, "genetic_modifications")
    }

    pub fn has_z_stack(&self) -> bool {
        self.enabled(IMAGING_PARAMETERS, "z_stack")
    }

    pub fn has_time_lapse(&self) -> bool {
        self.enabled(IMAGING_PARAMETERS, "time_lapse")
    }

    pub fn is_live_cell(&self) -> bool {
        self.field(SAMPLE_PREPARATION, "fixation_method")
            .and_then(Value::as_str)
            .is_some_and(|method| method == "live")
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
