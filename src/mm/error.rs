//! Erros do subsistema de memória.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Out of Memory (frames ou heap esgotados)
    OutOfMemory,
    /// Endereço inválido ou não alinhado
    InvalidAddress,
    /// Página não mapeada
    NotMapped,
    /// Falha do conversor físico<->virtual (sentinela do walker)
    TranslationFailed,
}

pub type MmResult<T> = Result<T, MmError>;
