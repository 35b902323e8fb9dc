//! Everything a decode needs besides the data itself.

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Bytes, FixedBytes};
use evmcodec_core::{DecodeObserver, DecoderConfig, FunctionInfo, NoopObserver, Slot, UserDefinedTypes};
use std::fmt;

static NOOP: NoopObserver = NoopObserver;

/// A contract the decoder can recognise by its deployed bytecode.
#[derive(Debug, Clone, Default)]
pub struct ContractContext {
    pub name: String,
    pub deployed_bytecode: Bytes,
    /// Used to name external function values; optional.
    pub abi: Option<JsonAbi>,
}

impl ContractContext {
    pub fn new(name: impl Into<String>, deployed_bytecode: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            deployed_bytecode: deployed_bytecode.into(),
            abi: None,
        }
    }

    pub fn with_abi(mut self, abi: JsonAbi) -> Self {
        self.abi = Some(abi);
        self
    }

    /// Whether `code` is this contract's runtime code.
    pub fn matches(&self, code: &[u8]) -> bool {
        !code.is_empty() && self.deployed_bytecode.as_ref() == code
    }

    /// Look a selector up in the ABI. Without an ABI nothing can be said.
    pub fn function_info(&self, selector: &FixedBytes<4>) -> FunctionInfo {
        match &self.abi {
            Some(abi) => match abi.functions().find(|f| f.selector() == *selector) {
                Some(function) => FunctionInfo::Known {
                    function: function.name.clone(),
                },
                None => FunctionInfo::Invalid,
            },
            None => FunctionInfo::Unknown,
        }
    }
}

/// Read-only inputs shared by every step of one decode.
#[derive(Clone)]
pub struct DecodeContext<'a> {
    /// User-defined type table for the compilation.
    pub types: &'a UserDefinedTypes,
    /// Contracts that contract and external-function values may resolve to.
    pub contracts: &'a [ContractContext],
    /// Mapping entry slots to decode. Only entries named here are decoded.
    pub mapping_keys: &'a [Slot],
    pub config: DecoderConfig,
    pub observer: &'a dyn DecodeObserver,
}

impl<'a> DecodeContext<'a> {
    pub fn new(types: &'a UserDefinedTypes) -> Self {
        Self {
            types,
            contracts: &[],
            mapping_keys: &[],
            config: DecoderConfig::default(),
            observer: &NOOP,
        }
    }

    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_contracts(mut self, contracts: &'a [ContractContext]) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn with_mapping_keys(mut self, mapping_keys: &'a [Slot]) -> Self {
        self.mapping_keys = mapping_keys;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn DecodeObserver) -> Self {
        self.observer = observer;
        self
    }

    /// The known contract whose runtime code is `code`.
    pub fn contract_for_code(&self, code: &[u8]) -> Option<&'a ContractContext> {
        self.contracts.iter().find(|c| c.matches(code))
    }
}

impl fmt::Debug for DecodeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("types", &self.types.len())
            .field("contracts", &self.contracts.len())
            .field("mapping_keys", &self.mapping_keys.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: &str = r#"[{"type":"function","name":"transfer","inputs":[
        {"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
        "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"}]"#;

    #[test]
    fn selector_resolution() {
        let abi: JsonAbi = serde_json::from_str(ABI).unwrap();
        let token = ContractContext::new("Token", vec![0x60u8, 0x80]).with_abi(abi);
        let transfer = FixedBytes::<4>::from([0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(
            token.function_info(&transfer),
            FunctionInfo::Known {
                function: "transfer".into()
            }
        );
        assert_eq!(token.function_info(&FixedBytes::ZERO), FunctionInfo::Invalid);
        let bare = ContractContext::new("Bare", vec![0x60u8]);
        assert_eq!(bare.function_info(&transfer), FunctionInfo::Unknown);
    }

    #[test]
    fn empty_code_never_matches() {
        let empty = ContractContext::new("Ghost", Vec::<u8>::new());
        assert!(!empty.matches(&[]));
        let types = UserDefinedTypes::new();
        let contracts = [empty];
        let ctx = DecodeContext::new(&types).with_contracts(&contracts);
        assert!(ctx.contract_for_code(&[]).is_none());
    }
}
