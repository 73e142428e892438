//! # Erros do Decodificador
//!
//! Apenas condições que o chamador pode provocar viram [`DecoderError`].
//! Um passo sem candidatos viáveis **não** é erro: é tratado pelo caminho de
//! *skip* do [`Viterbi`](crate::viterbi::Viterbi).

use thiserror::Error;

/// Erros produzidos pela construção e pela operação do decodificador.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecoderError {
    /// Nenhum estado inicial foi fornecido na construção.
    #[error("nenhum estado inicial fornecido")]
    NoInitialState,

    /// Os estados iniciais não bastam para o redutor produzir uma chave
    /// (ex: ordem 2 com um único estado inicial).
    #[error("estados iniciais insuficientes: {required} necessário(s), {supplied} fornecido(s)")]
    InsufficientSeeds { required: usize, supplied: usize },

    /// Redutor com ordem de Markov zero.
    #[error("ordem de Markov inválida: {0}")]
    InvalidOrder(usize),

    /// Um modelo devolveu NaN como log-probabilidade.
    #[error("modelo produziu log-probabilidade NaN no passo {step}")]
    NotANumber { step: usize },

    /// Limiar de beam negativo ou NaN.
    #[error("limiar de beam inválido: {0}")]
    InvalidBeamThreshold(f64),

    /// A fronteira chegou vazia ao fim da decodificação.
    ///
    /// Inalcançável com modelos que respeitam o contrato; indica bug em um
    /// modelo fornecido pelo chamador.
    #[error("fronteira vazia ao finalizar a decodificação")]
    EmptyFrontier,
}

/// Alias de conveniência usado em todo o crate.
pub type Result<T> = std::result::Result<T, DecoderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DecoderError::InsufficientSeeds { required: 2, supplied: 1 };
        assert_eq!(
            err.to_string(),
            "estados iniciais insuficientes: 2 necessário(s), 1 fornecido(s)"
        );
        assert_eq!(
            DecoderError::NotANumber { step: 3 }.to_string(),
            "modelo produziu log-probabilidade NaN no passo 3"
        );
        assert_eq!(DecoderError::InvalidOrder(0).to_string(), "ordem de Markov inválida: 0");
    }
}
