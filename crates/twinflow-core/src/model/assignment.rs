//! レイヤー → プロバイダー割当
//!
//! プロジェクト設定から一度だけ読み込まれ、以降は不変の値として
//! リゾルバ → オーケストレーター → アダプターへ明示的に渡される。
//! プロセス全体で共有する可変グローバルは持たない。

use crate::error::{CoreError, Result};
use crate::model::layer::LayerId;
use crate::model::provider::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// レイヤーごとのホスティングプロバイダー割当
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAssignment {
    layers: BTreeMap<LayerId, ProviderId>,
}

impl ProviderAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全レイヤーを同一プロバイダーに割り当てる
    pub fn uniform(provider: ProviderId) -> Self {
        let mut assignment = Self::new();
        for layer in LayerId::PIPELINE_ORDER {
            assignment.set(layer, provider);
        }
        assignment
    }

    pub fn set(&mut self, layer: LayerId, provider: ProviderId) -> &mut Self {
        self.layers.insert(layer, provider);
        self
    }

    /// 明示的に設定された値のみ返す（継承なし）
    pub fn get(&self, layer: LayerId) -> Option<ProviderId> {
        self.layers.get(&layer).copied()
    }

    /// レイヤーのプロバイダーを解決する
    ///
    /// L4 / L5 は未設定なら L3 hot から継承。それ以外のレイヤーは
    /// 明示的な割当が必須で、欠落は ConfigurationError になる。
    pub fn resolve(&self, layer: LayerId) -> Result<ProviderId> {
        if let Some(provider) = self.get(layer) {
            return Ok(provider);
        }
        match layer {
            LayerId::TwinModel | LayerId::Dashboard => self
                .get(LayerId::HotStorage)
                .ok_or(CoreError::MissingAssignment(LayerId::HotStorage)),
            other => Err(CoreError::MissingAssignment(other)),
        }
    }

    /// 全レイヤーが解決可能かを検証
    pub fn validate(&self) -> Result<()> {
        for layer in LayerId::PIPELINE_ORDER {
            self.resolve(layer)?;
        }
        Ok(())
    }

    /// 割当に登場するプロバイダー集合（重複なし、安定順）
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut seen = Vec::new();
        for layer in LayerId::PIPELINE_ORDER {
            if let Ok(provider) = self.resolve(layer) {
                if !seen.contains(&provider) {
                    seen.push(provider);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l4_l5_inherit_from_hot() {
        let mut assignment = ProviderAssignment::new();
        assignment
            .set(LayerId::Ingestion, ProviderId::Aws)
            .set(LayerId::Compute, ProviderId::Aws)
            .set(LayerId::HotStorage, ProviderId::Azure)
            .set(LayerId::ColdStorage, ProviderId::Aws)
            .set(LayerId::ArchiveStorage, ProviderId::Aws);

        assert_eq!(
            assignment.resolve(LayerId::TwinModel).unwrap(),
            ProviderId::Azure
        );
        assert_eq!(
            assignment.resolve(LayerId::Dashboard).unwrap(),
            ProviderId::Azure
        );
        assert!(assignment.validate().is_ok());
    }

    #[test]
    fn test_missing_required_layer_is_an_error() {
        let mut assignment = ProviderAssignment::new();
        assignment.set(LayerId::Ingestion, ProviderId::Aws);

        assert_eq!(
            assignment.resolve(LayerId::Compute),
            Err(CoreError::MissingAssignment(LayerId::Compute))
        );
        assert!(assignment.validate().is_err());
    }

    #[test]
    fn test_providers_are_deduplicated() {
        let mut assignment = ProviderAssignment::uniform(ProviderId::Aws);
        assignment.set(LayerId::TwinModel, ProviderId::Azure);
        assert_eq!(
            assignment.providers(),
            vec![ProviderId::Aws, ProviderId::Azure]
        );
    }
}
