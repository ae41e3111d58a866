//! Erros de syscall -> errno negado em RAX.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysError {
    /// ENOENT — caminho inexistente
    NotFound,
    /// EIO — falha de I/O no backend
    Io,
    /// EBADF — fd inválido ou fechado
    BadFd,
    /// ENOMEM — frames/heap esgotados
    OutOfMemory,
    /// EFAULT — ponteiro de usuário inválido
    Fault,
    /// EINVAL — argumento inválido
    InvalidArgument,
    /// ENOSYS — syscall desconhecida
    NoSys,
}

impl SysError {
    pub fn errno(self) -> i64 {
        match self {
            SysError::NotFound => 2,
            SysError::Io => 5,
            SysError::BadFd => 9,
            SysError::OutOfMemory => 12,
            SysError::Fault => 14,
            SysError::InvalidArgument => 22,
            SysError::NoSys => 38,
        }
    }

    /// Valor de retorno em RAX: errno negado.
    pub fn as_ret(self) -> u64 {
        (-self.errno()) as u64
    }
}

pub type SysResult = Result<u64, SysError>;
