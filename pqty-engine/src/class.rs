//! 按类名与部件类型属性对实体分类。

/// 聚合与几何规则关心的实体类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityClass {
    Pipe,
    Elbow,
    Tee,
    Valve,
    Reducer,
    /// 垫片、螺栓组、对焊等紧固件。
    Fastener,
    /// 承插焊、螺纹等接头。
    Joint,
    Connector,
    Part,
    Unknown,
}

const FASTENER_MARKERS: [&str; 4] = ["gasket", "boltset", "buttweld", "bolt set"];

impl EntityClass {
    /// 依据类名（以及可选的部件类型属性）判定类别。
    ///
    /// 紧固件按子串匹配；其余类别按驼峰/分隔符拆分后的单词匹配，
    /// 避免 `SteelPlate` 之类的类名误命中 `tee`。
    pub fn classify(class_name: &str, part_type: Option<&str>) -> Self {
        let lowered = class_name.trim().to_lowercase();
        let part_type = part_type.map(|value| value.trim().to_lowercase());

        let is_fastener = |text: &str| FASTENER_MARKERS.iter().any(|marker| text.contains(marker));
        if part_type.as_deref().is_some_and(is_fastener) || is_fastener(&lowered) {
            return EntityClass::Fastener;
        }
        if lowered.is_empty() {
            return EntityClass::Unknown;
        }

        let words = split_words(class_name);
        let has = |word: &str| words.iter().any(|w| w == word);

        if lowered.ends_with("weld") || has("joint") {
            EntityClass::Joint
        } else if has("connector") {
            EntityClass::Connector
        } else if has("elbow") || has("bend") {
            EntityClass::Elbow
        } else if has("tee") {
            EntityClass::Tee
        } else if has("reducer") || has("swage") {
            EntityClass::Reducer
        } else if has("valve") {
            EntityClass::Valve
        } else if words.last().is_some_and(|w| w == "pipe") {
            EntityClass::Pipe
        } else {
            EntityClass::Part
        }
    }
}

/// `PipeInlineAsset` -> `["pipe", "inline", "asset"]`。
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_plant_classes() {
        assert_eq!(EntityClass::classify("Pipe", None), EntityClass::Pipe);
        assert_eq!(EntityClass::classify("Elbow", None), EntityClass::Elbow);
        assert_eq!(EntityClass::classify("Tee", None), EntityClass::Tee);
        assert_eq!(EntityClass::classify("ConcentricReducer", None), EntityClass::Reducer);
        assert_eq!(EntityClass::classify("GateValve", None), EntityClass::Valve);
        assert_eq!(EntityClass::classify("Connector", None), EntityClass::Connector);
        assert_eq!(EntityClass::classify("PipeInlineAsset", None), EntityClass::Part);
        assert_eq!(EntityClass::classify("Flange", None), EntityClass::Part);
    }

    #[test]
    fn fasteners_match_by_substring_or_part_type() {
        assert_eq!(EntityClass::classify("Gasket", None), EntityClass::Fastener);
        assert_eq!(EntityClass::classify("BoltSet", None), EntityClass::Fastener);
        assert_eq!(EntityClass::classify("Buttweld", None), EntityClass::Fastener);
        assert_eq!(
            EntityClass::classify("Part", Some("Gasket")),
            EntityClass::Fastener
        );
    }

    #[test]
    fn welds_and_joints() {
        assert_eq!(EntityClass::classify("SocketWeld", None), EntityClass::Joint);
        assert_eq!(EntityClass::classify("ThreadedJoint", None), EntityClass::Joint);
    }

    #[test]
    fn word_matching_avoids_false_positives() {
        assert_eq!(EntityClass::classify("SteelPlate", None), EntityClass::Part);
        assert_eq!(EntityClass::classify("PipeSupport", None), EntityClass::Part);
        assert_eq!(EntityClass::classify("  ", None), EntityClass::Unknown);
        assert_eq!(EntityClass::classify("", None), EntityClass::Unknown);
    }

    #[test]
    fn splits_camel_case_and_separators() {
        assert_eq!(split_words("PipeInlineAsset"), vec!["pipe", "inline", "asset"]);
        assert_eq!(split_words("equal_tee"), vec!["equal", "tee"]);
        assert_eq!(split_words("TEE"), vec!["tee"]);
    }
}
