//! 脊柱模块
//!
//! 阅读顺序中的一项，对应OPF里的 `<itemref>`。

/// 脊柱项信息(阅读顺序)
#[derive(Debug, Clone, PartialEq)]
pub struct SpineItem {
    /// 引用的清单项ID
    pub idref: String,
    /// 是否线性阅读，OPF中缺省为yes
    pub linear: bool,
}

impl SpineItem {
    /// 创建新的线性脊柱项
    pub fn new(idref: impl Into<String>) -> Self {
        Self {
            idref: idref.into(),
            linear: true,
        }
    }

    pub fn is_linear(&self) -> bool {
        self.linear
    }

    /// 写入 `<itemref linear="...">` 时使用的属性值
    pub fn linear_attribute(&self) -> &'static str {
        if self.linear { "yes" } else { "no" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_attribute() {
        let mut item = SpineItem::new("ch1");
        assert_eq!(item.linear_attribute(), "yes");
        item.linear = false;
        assert_eq!(item.linear_attribute(), "no");
        assert!(!item.is_linear());
    }
}
