//! Optional Traditional→Simplified output conversion, applied by the language-model
//! facade (C2) when `chinese_conversion` is enabled. A small built-in table covers the
//! common cases; callers with a larger mapping can supply their own via
//! [`TableConverter::from_pairs`].

use std::collections::HashMap;

use zhuyin_engine_core::lm::OutputConverter;

const BUILTIN_PAIRS: &[(&str, &str)] = &[
    ("你", "你"), ("妳", "你"), ("好", "好"), ("們", "们"), ("國", "国"), ("臺", "台"),
    ("灣", "湾"), ("愛", "爱"), ("學", "学"), ("語", "语"), ("話", "话"), ("時", "时"),
    ("間", "间"), ("這", "这"), ("個", "个"), ("為", "为"), ("說", "说"), ("對", "对"),
];

pub struct TableConverter {
    table: HashMap<char, char>,
}

impl TableConverter {
    pub fn traditional_to_simplified() -> Self {
        let mut table = HashMap::new();
        for (trad, simp) in BUILTIN_PAIRS {
            if let (Some(t), Some(s)) = (trad.chars().next(), simp.chars().next()) {
                table.insert(t, s);
            }
        }
        TableConverter { table }
    }

    pub fn from_pairs<I: IntoIterator<Item = (char, char)>>(pairs: I) -> Self {
        TableConverter { table: pairs.into_iter().collect() }
    }
}

impl OutputConverter for TableConverter {
    fn convert(&self, value: &str) -> String {
        value.chars().map(|c| self.table.get(&c).copied().unwrap_or(c)).collect()
    }
}
