//! Configuração do laço de decodificação usado por [`decode`](crate::viterbi::decode).

use serde::{Deserialize, Serialize};

/// Tamanho mínimo da fronteira para o beam filter agir.
pub const DEFAULT_MIN_BEAM_FRONTIER: usize = 10;

/// Parâmetros de execução de uma decodificação completa.
///
/// Todos os campos têm default, então um JSON parcial como
/// `{"beam_threshold": 4.0}` é válido.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Margem em log10 abaixo do melhor caminho; `None` desliga o beam.
    pub beam_threshold: Option<f64>,
    /// Fronteiras menores que isso não são podadas.
    pub min_beam_frontier: usize,
    /// Pontua o leque (ancestral × candidato) em paralelo com rayon.
    pub parallel: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_threshold: None,
            min_beam_frontier: DEFAULT_MIN_BEAM_FRONTIER,
            parallel: false,
        }
    }
}

impl DecoderConfig {
    pub fn with_beam(mut self, threshold: f64) -> Self {
        self.beam_threshold = Some(threshold);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DecoderConfig = serde_json::from_str(r#"{"beam_threshold": 4.0}"#).unwrap();
        assert_eq!(config.beam_threshold, Some(4.0));
        assert_eq!(config.min_beam_frontier, DEFAULT_MIN_BEAM_FRONTIER);
        assert!(!config.parallel);

        let empty: DecoderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, DecoderConfig::default());
    }

    #[test]
    fn test_builder_round_trip() {
        let config = DecoderConfig::default().with_beam(2.5).with_parallel(true);
        let json = serde_json::to_string(&config).unwrap();
        let back: DecoderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
