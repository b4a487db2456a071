//! 方法分派 (Method Dispatch)
//!
//! 把符号化动词 (GET / POSTJSON / PUTFILE ...) 映射为 HTTP 方法、Content-Type 与请求体来源。

use std::str::FromStr;

use reqwest::Method;
use strum_macros::{Display, EnumIter, EnumString};

use crate::core::error::{Result, SpiderError};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const XML_CONTENT_TYPE: &str = "text/xml";
pub const FILE_CONTENT_TYPE: &str = "multipart/form-data";

/// 符号化动词
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Verb {
    #[default]
    Get,
    Delete,
    Post,
    PostJson,
    PostXml,
    PostFile,
    Put,
    PutJson,
    PutXml,
    PutFile,
    /// 非内置方法，必须走 `send_with`
    Other,
}

impl Verb {
    /// 解析动词，大小写不敏感；空串视为 GET，未知动词报错
    pub fn parse(verb: &str) -> Result<Self> {
        let verb = verb.trim();
        if verb.is_empty() {
            return Ok(Verb::Get);
        }
        Verb::from_str(verb).map_err(|_| SpiderError::UnknownVerb(verb.to_string()))
    }
}

/// 请求体来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySource {
    /// 无请求体，发送前清空待发送表单与二进制数据
    None,
    /// 表单编码
    Form,
    /// 原始二进制 (JSON / XML / 文件)
    Binary,
}

/// 分派结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub method: Method,
    pub content_type: Option<&'static str>,
    pub body: BodySource,
}

impl Dispatch {
    fn new(method: Method, content_type: Option<&'static str>, body: BodySource) -> Self {
        Self {
            method,
            content_type,
            body,
        }
    }

    /// binary 为空时管线回落到表单
    pub fn use_binary(&self) -> bool {
        self.body == BodySource::Binary
    }
}

/// 动词 -> (方法, Content-Type, 请求体来源)
pub fn resolve(verb: Verb) -> Result<Dispatch> {
    let dispatch = match verb {
        Verb::Get => Dispatch::new(Method::GET, None, BodySource::None),
        Verb::Delete => Dispatch::new(Method::DELETE, None, BodySource::None),
        Verb::Post => Dispatch::new(Method::POST, Some(FORM_CONTENT_TYPE), BodySource::Form),
        Verb::PostJson => Dispatch::new(Method::POST, Some(JSON_CONTENT_TYPE), BodySource::Binary),
        Verb::PostXml => Dispatch::new(Method::POST, Some(XML_CONTENT_TYPE), BodySource::Binary),
        Verb::PostFile => Dispatch::new(Method::POST, Some(FILE_CONTENT_TYPE), BodySource::Binary),
        Verb::Put => Dispatch::new(Method::PUT, Some(FORM_CONTENT_TYPE), BodySource::Form),
        Verb::PutJson => Dispatch::new(Method::PUT, Some(JSON_CONTENT_TYPE), BodySource::Binary),
        Verb::PutXml => Dispatch::new(Method::PUT, Some(XML_CONTENT_TYPE), BodySource::Binary),
        Verb::PutFile => Dispatch::new(Method::PUT, Some(FILE_CONTENT_TYPE), BodySource::Binary),
        Verb::Other => return Err(SpiderError::UnsupportedMethod(verb.to_string())),
    };
    Ok(dispatch)
}

/// 按字符串解析并分派
pub fn resolve_str(verb: &str) -> Result<Dispatch> {
    resolve(Verb::parse(verb)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_case_insensitive() {
        assert_eq!(resolve_str("postjson").unwrap(), resolve_str("POSTJSON").unwrap());
        assert_eq!(resolve_str("PutXml").unwrap(), resolve_str("PUTXML").unwrap());
        assert_eq!(Verb::parse("delete").unwrap(), Verb::Delete);
    }

    #[test]
    fn test_table() {
        let d = resolve(Verb::PostJson).unwrap();
        assert_eq!(d.method, Method::POST);
        assert_eq!(d.content_type, Some(JSON_CONTENT_TYPE));
        assert!(d.use_binary());

        let d = resolve(Verb::Put).unwrap();
        assert_eq!(d.method, Method::PUT);
        assert_eq!(d.content_type, Some(FORM_CONTENT_TYPE));
        assert_eq!(d.body, BodySource::Form);

        let d = resolve(Verb::PutFile).unwrap();
        assert_eq!(d.content_type, Some(FILE_CONTENT_TYPE));

        let d = resolve(Verb::Delete).unwrap();
        assert_eq!(d.method, Method::DELETE);
        assert_eq!(d.content_type, None);
        assert_eq!(d.body, BodySource::None);
    }

    #[test]
    fn test_put_mirrors_post() {
        let pairs = [
            (Verb::Post, Verb::Put),
            (Verb::PostJson, Verb::PutJson),
            (Verb::PostXml, Verb::PutXml),
            (Verb::PostFile, Verb::PutFile),
        ];
        for (post, put) in pairs {
            let post = resolve(post).unwrap();
            let put = resolve(put).unwrap();
            assert_eq!(post.method, Method::POST);
            assert_eq!(put.method, Method::PUT);
            assert_eq!(post.content_type, put.content_type);
            assert_eq!(post.body, put.body);
        }
    }

    #[test]
    fn test_other_is_unsupported() {
        assert!(matches!(resolve_str("OTHER"), Err(SpiderError::UnsupportedMethod(_))));
        assert!(matches!(resolve(Verb::Other), Err(SpiderError::UnsupportedMethod(_))));
    }

    #[test]
    fn test_unknown_verb_fails() {
        match resolve_str("PATCHJSON") {
            Err(SpiderError::UnknownVerb(v)) => assert_eq!(v, "PATCHJSON"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(Verb::parse("").unwrap(), Verb::Get);
        assert_eq!(Verb::parse("  get ").unwrap(), Verb::Get);
    }

    #[test]
    fn test_display_roundtrip() {
        for verb in Verb::iter() {
            assert_eq!(Verb::parse(&verb.to_string()).unwrap(), verb);
        }
        assert_eq!(Verb::PostJson.to_string(), "POSTJSON");
    }
}
