//! Catálogo de números de syscall.
//!
//! Esquema Linux-style, fixado de ponta a ponta com os stubs da libc
//! hospedada (`syscall`/`int 0x80` com número em RAX). Números uma vez
//! atribuídos NUNCA mudam; funcionalidade nova = número novo.
//!
//! | Faixa     | Origem                               |
//! |-----------|--------------------------------------|
//! | 0-158     | Números Linux correspondentes        |
//! | 100       | `isatty` (slot livre no nosso perfil)|
//! | 200+      | Extensões próprias (reentrância libc)|

/// Lê de um fd. Args: (fd, buf, len). fd 0 bloqueia por uma linha.
pub const SYS_READ: usize = 0;

/// Escreve num fd. Args: (fd, buf, len). 1/2 = console.
pub const SYS_WRITE: usize = 1;

/// Abre um caminho. Args: (path, flags, mode). Retorno: fd.
pub const SYS_OPEN: usize = 2;

/// Fecha um fd. Args: (fd).
pub const SYS_CLOSE: usize = 3;

/// Metadados mínimos de um fd. Args: (fd, statbuf).
pub const SYS_FSTAT: usize = 5;

/// Ajusta o offset em cache. Args: (fd, offset, whence). Sem I/O.
pub const SYS_LSEEK: usize = 8;

/// Program break. Args: (incremento). Encolher não é suportado.
pub const SYS_SBRK: usize = 12;

/// tid da task corrente. Sem args.
pub const SYS_GETPID: usize = 39;

/// Encerra a task. Args: (código). Não retorna.
pub const SYS_EXIT: usize = 60;

/// Aceita qualquer entrada e retorna 0 (stub). Args: (pid, sig).
pub const SYS_KILL: usize = 62;

/// fd é um tty? Args: (fd). Verdadeiro para 0/1/2.
pub const SYS_ISATTY: usize = 100;

/// Base de FS/GS via MSR (TLS da libc). Args: (code, addr).
pub const SYS_ARCH_PRCTL: usize = 158;

/// Página zerada de kernel para o estado de reentrância da libc.
/// Args: (size <= 4096). Retorno: endereço virtual.
pub const SYS_GET_REENT: usize = 200;
