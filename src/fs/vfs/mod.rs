//! VFS — multiplexador fino sobre backends de filesystem.
//!
//! Um backend registra as operações que suporta atrás da trait
//! [`VfsBackend`]; a tabela global de handles pertence ao VFS, não aos
//! backends. fds por task (3..31) apontam para índices da tabela
//! global; 0/1/2 são reservados (teclado/console) e não passam pela
//! tabela.
//!
//! Arquivos abertos carregam o conteúdo inteiro preguiçosamente na
//! primeira leitura; o `open` consulta apenas o tamanho. Ler além do
//! fim retorna 0 (EOF), distinto dos códigos negativos de erro.

use super::block_cache::BlockCache;
use super::{DirEntryInfo, FsError};
use crate::sync::Spinlock;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

/// Capacidade da tabela global de handles.
pub const MAX_OPEN_FILES: usize = 2048;

/// fds locais por task.
pub const MAX_FDS: usize = 32;

/// Primeiro fd alocável (0/1/2 são reservados).
pub const FIRST_USER_FD: i32 = 3;

/// Comprimento máximo de caminho armazenado num handle.
pub const MAX_PATH: usize = 255;

/// Operações que um backend expõe ao VFS.
pub trait VfsBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn read_file(&self, path: &str, buf: &mut [u8]) -> Result<usize, FsError>;
    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), FsError>;
    fn get_file_size(&self, path: &str) -> Result<u32, FsError>;
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntryInfo>, FsError>;
    fn is_dir(&self, path: &str) -> bool;
}

/// Função de montagem registrada: tenta reconhecer o volume.
type MountFn = fn(Arc<Spinlock<BlockCache>>) -> Option<Box<dyn VfsBackend>>;

static BACKENDS: Spinlock<Vec<(&'static str, MountFn)>> = Spinlock::new(Vec::new());
static ACTIVE: Spinlock<Option<Arc<dyn VfsBackend>>> = Spinlock::new(None);

/// Adaptador FAT16 -> VfsBackend.
struct Fat16Backend {
    sb: super::fat16::Fat16Super,
}

impl VfsBackend for Fat16Backend {
    fn name(&self) -> &'static str {
        "fat16"
    }

    fn read_file(&self, path: &str, buf: &mut [u8]) -> Result<usize, FsError> {
        super::fat16::file::read_file(&self.sb, path, buf)
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), FsError> {
        super::fat16::file::write_file(&self.sb, path, data)?;
        self.sb.sync()
    }

    fn get_file_size(&self, path: &str) -> Result<u32, FsError> {
        super::fat16::file::get_file_size(&self.sb, path)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntryInfo>, FsError> {
        super::fat16::dir::list_dir(&self.sb, path)
    }

    fn is_dir(&self, path: &str) -> bool {
        super::fat16::dir::is_dir(&self.sb, path)
    }
}

fn mount_fat16(cache: Arc<Spinlock<BlockCache>>) -> Option<Box<dyn VfsBackend>> {
    match super::fat16::Fat16Super::mount_with_cache(cache) {
        Ok(sb) => Some(Box::new(Fat16Backend { sb })),
        Err(_) => None,
    }
}

/// Registra um backend montável.
pub fn register_backend(name: &'static str, mount: MountFn) {
    BACKENDS.lock().push((name, mount));
}

/// Registra os backends embutidos (FAT16 primeiro, por preferência do
/// layout de disco do projeto).
pub fn register_builtin_backends() {
    let mut b = BACKENDS.lock();
    if b.iter().any(|(n, _)| *n == "fat16") {
        return;
    }
    b.push(("fat16", mount_fat16));
}

/// Tenta montar cada backend registrado, em ordem. Retorna o nome do
/// que reconheceu o volume.
pub fn mount_with_cache(cache: Arc<Spinlock<BlockCache>>) -> Result<&'static str, FsError> {
    let backends: Vec<(&'static str, MountFn)> = BACKENDS.lock().clone();
    for (name, mount) in backends {
        if let Some(backend) = mount(cache.clone()) {
            *ACTIVE.lock() = Some(Arc::from(backend));
            return Ok(name);
        }
    }
    Err(FsError::InvalidFormat)
}

/// Backend ativo, se algum volume está montado.
pub fn active_backend() -> Option<Arc<dyn VfsBackend>> {
    ACTIVE.lock().clone()
}

/// Desmonta (testes).
pub fn unmount() {
    *ACTIVE.lock() = None;
}

// ============================================================================
// TABELA GLOBAL DE HANDLES
// ============================================================================

/// Arquivo aberto: caminho + conteúdo em cache + offset.
struct VfsFile {
    path: String,
    /// Conteúdo completo, carregado preguiçosamente na primeira leitura.
    buf: Option<Vec<u8>>,
    /// Tamanho conhecido do arquivo (preenchido no open).
    buf_size: u32,
    offset: u32,
}

static OPEN_FILES: Spinlock<Vec<Option<Box<VfsFile>>>> = Spinlock::new(Vec::new());

fn allocate_global_handle(file: Box<VfsFile>) -> Option<usize> {
    let mut table = OPEN_FILES.lock();
    for (i, slot) in table.iter_mut().enumerate() {
        if slot.is_none() {
            *slot = Some(file);
            return Some(i);
        }
    }
    if table.len() < MAX_OPEN_FILES {
        table.push(Some(file));
        return Some(table.len() - 1);
    }
    None
}

fn free_global_handle(idx: usize) {
    let mut table = OPEN_FILES.lock();
    if idx < table.len() {
        table[idx] = None;
    }
}

/// Quantidade de handles vivos (diagnóstico/testes).
pub fn open_handle_count() -> usize {
    OPEN_FILES.lock().iter().filter(|s| s.is_some()).count()
}

// ============================================================================
// TABELA DE FDS POR TASK
// ============================================================================

/// Tabela de file descriptors de uma task: fd local -> índice global
/// (-1 = livre). Embutida no TCB.
#[derive(Debug, Clone, Copy)]
pub struct FdTable {
    slots: [i32; MAX_FDS],
}

impl FdTable {
    /// Tabela vazia (tudo -1).
    pub const fn new() -> Self {
        Self {
            slots: [-1; MAX_FDS],
        }
    }

    /// Tabela de task de kernel: 0/1/2 apontam para o console.
    pub const fn with_std_fds() -> Self {
        let mut slots = [-1; MAX_FDS];
        slots[0] = 0;
        slots[1] = 1;
        slots[2] = 2;
        Self { slots }
    }

    fn alloc(&mut self) -> Option<i32> {
        for fd in FIRST_USER_FD as usize..MAX_FDS {
            if self.slots[fd] == -1 {
                return Some(fd as i32);
            }
        }
        None
    }

    fn get(&self, fd: i32) -> Option<usize> {
        if !(FIRST_USER_FD..MAX_FDS as i32).contains(&fd) {
            return None;
        }
        let v = self.slots[fd as usize];
        if v < 0 {
            None
        } else {
            Some(v as usize)
        }
    }

    fn set(&mut self, fd: i32, global: i32) {
        self.slots[fd as usize] = global;
    }

    /// Libera todos os handles desta tabela (saída da task).
    pub fn release_all(&mut self) {
        for fd in FIRST_USER_FD as usize..MAX_FDS {
            let v = self.slots[fd];
            if v >= 0 {
                free_global_handle(v as usize);
                self.slots[fd] = -1;
            }
        }
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// OPERAÇÕES CENTRAIS (parametrizadas pela FdTable)
// ============================================================================
//
// O syscall layer embrulha estas funções com a tabela da task corrente;
// os testes de host passam tabelas próprias.

/// Abre `path`. Consulta o tamanho mas NÃO lê conteúdo. Retorna o fd
/// local ou código negativo.
pub fn open_with(fds: &mut FdTable, path: &str, _flags: i32, _mode: i32) -> i32 {
    let backend = match active_backend() {
        Some(b) => b,
        None => return FsError::Unsupported.code(),
    };
    if path.is_empty() || path.len() > MAX_PATH {
        return -1;
    }

    let mut file = Box::new(VfsFile {
        path: String::from(path),
        buf: None,
        buf_size: 0,
        offset: 0,
    });

    // tamanho agora; conteúdo só na primeira leitura
    if let Ok(sz) = backend.get_file_size(&file.path) {
        file.buf_size = sz;
    }

    let global_idx = match allocate_global_handle(file) {
        Some(i) => i,
        None => return -1,
    };

    let fd = match fds.alloc() {
        Some(fd) => fd,
        None => {
            free_global_handle(global_idx);
            return -1;
        }
    };
    fds.set(fd, global_idx as i32);
    fd
}

/// Fecha um fd: libera o handle global e zera o slot local.
pub fn close_with(fds: &mut FdTable, fd: i32) -> i32 {
    match fds.get(fd) {
        Some(global) => {
            free_global_handle(global);
            fds.set(fd, -1);
            0
        }
        None => -1,
    }
}

/// Garante que o conteúdo do handle está carregado. Retorna false em
/// falha de backend.
fn ensure_loaded(global: usize) -> bool {
    let backend = match active_backend() {
        Some(b) => b,
        None => return false,
    };

    // caminho/estado sob o lock; o I/O do backend fora dele
    let (path, size) = {
        let table = OPEN_FILES.lock();
        match table.get(global).and_then(|s| s.as_ref()) {
            Some(f) => {
                if f.buf.is_some() {
                    return true;
                }
                (f.path.clone(), f.buf_size)
            }
            None => return false,
        }
    };

    // tamanho pode não ter sido resolvido no open
    let size = if size == 0 {
        match backend.get_file_size(&path) {
            Ok(s) => s,
            Err(_) => 0,
        }
    } else {
        size
    };

    let mut data = vec![0u8; size as usize];
    let read = if size > 0 {
        match backend.read_file(&path, &mut data) {
            Ok(n) => n,
            Err(_) => {
                crate::kwarn!("(VFS) read_file falhou para '{}'", path);
                return false;
            }
        }
    } else {
        0
    };
    data.truncate(read);

    let mut table = OPEN_FILES.lock();
    if let Some(f) = table.get_mut(global).and_then(|s| s.as_mut()) {
        f.buf_size = read as u32;
        f.buf = Some(data);
    }
    true
}

/// Lê de um fd. fd 0 bloqueia por uma linha do teclado (até `\n`);
/// fds >= 3 leem do cache de conteúdo. Retorna bytes lidos, 0 em EOF,
/// negativo em erro.
pub fn read_with(fds: &mut FdTable, fd: i32, buf: &mut [u8]) -> i64 {
    if fd == 0 {
        let mut i = 0usize;
        while i < buf.len() {
            let c = crate::drivers::keyboard::getchar();
            buf[i] = c;
            i += 1;
            if c == b'\n' {
                break;
            }
        }
        return i as i64;
    }

    let global = match fds.get(fd) {
        Some(g) => g,
        None => return -1,
    };

    if !ensure_loaded(global) {
        return -1;
    }

    let mut table = OPEN_FILES.lock();
    let f = match table.get_mut(global).and_then(|s| s.as_mut()) {
        Some(f) => f,
        None => return -1,
    };
    let data = match f.buf.as_ref() {
        Some(d) => d,
        None => return 0,
    };

    let avail = (f.buf_size as usize).saturating_sub(f.offset as usize);
    let take = buf.len().min(avail);
    buf[..take].copy_from_slice(&data[f.offset as usize..f.offset as usize + take]);
    f.offset += take as u32;
    take as i64
}

/// Escreve num fd. fds 1/2 vão para o console em pedaços de <= 1 KiB;
/// fds >= 3 fazem overwrite truncante via backend.
pub fn write_with(fds: &mut FdTable, fd: i32, buf: &[u8]) -> i64 {
    if fd == 1 || fd == 2 {
        for chunk in buf.chunks(1024) {
            match core::str::from_utf8(chunk) {
                Ok(s) => crate::kprint!("{}", s),
                Err(_) => {
                    for &b in chunk {
                        crate::kprint!("{}", b as char);
                    }
                }
            }
        }
        return buf.len() as i64;
    }

    let global = match fds.get(fd) {
        Some(g) => g,
        None => return -1,
    };
    let backend = match active_backend() {
        Some(b) => b,
        None => return -1,
    };

    let path = {
        let table = OPEN_FILES.lock();
        match table.get(global).and_then(|s| s.as_ref()) {
            Some(f) => f.path.clone(),
            None => return -1,
        }
    };

    if backend.write_file(&path, buf).is_err() {
        return -1;
    }

    // atualizar o cache do handle: conteúdo novo, offset no fim
    let mut table = OPEN_FILES.lock();
    if let Some(f) = table.get_mut(global).and_then(|s| s.as_mut()) {
        f.buf = Some(buf.to_vec());
        f.buf_size = buf.len() as u32;
        f.offset = buf.len() as u32;
    }
    buf.len() as i64
}

/// lseek: só atualiza o offset em cache, sem I/O.
pub fn lseek_with(fds: &mut FdTable, fd: i32, offset: i64, whence: i32) -> i64 {
    let global = match fds.get(fd) {
        Some(g) => g,
        None => return -1,
    };

    let mut table = OPEN_FILES.lock();
    let f = match table.get_mut(global).and_then(|s| s.as_mut()) {
        Some(f) => f,
        None => return -1,
    };

    let new_off = match whence {
        0 => offset,                          // SEEK_SET
        1 => f.offset as i64 + offset,        // SEEK_CUR
        2 => f.buf_size as i64 + offset,      // SEEK_END
        _ => return -1,
    };
    if new_off < 0 {
        return -1;
    }
    f.offset = new_off as u32;
    f.offset as i64
}

/// Modos do fstat (subset de S_IFMT).
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFREG: u32 = 0o100000;

/// fstat mínimo: `(mode, size)`. tty para 0/1/2.
pub fn fstat_with(fds: &FdTable, fd: i32) -> Result<(u32, u64), i32> {
    if (0..=2).contains(&fd) {
        return Ok((S_IFCHR, 0));
    }
    let global = match fds.get(fd) {
        Some(g) => g,
        None => return Err(-1),
    };
    let table = OPEN_FILES.lock();
    match table.get(global).and_then(|s| s.as_ref()) {
        Some(f) => Ok((S_IFREG, f.buf_size as u64)),
        None => Err(-1),
    }
}

/// O handle já carregou conteúdo? (verificação do lazy-load em testes)
pub fn handle_content_loaded(fds: &FdTable, fd: i32) -> Option<bool> {
    let global = fds.get(fd)?;
    let table = OPEN_FILES.lock();
    table
        .get(global)
        .and_then(|s| s.as_ref())
        .map(|f| f.buf.is_some())
}

/// isatty: verdadeiro para os fds padrão.
pub fn isatty(fd: i32) -> bool {
    (0..=2).contains(&fd)
}

// ============================================================================
// OPERAÇÕES POR CAMINHO
// ============================================================================

/// Lista um caminho (diretório) pelo backend ativo.
pub fn list_path(path: &str) -> Result<Vec<DirEntryInfo>, FsError> {
    match active_backend() {
        Some(b) => b.list_dir(path),
        None => Err(FsError::Unsupported),
    }
}

/// Resolve um caminho: `(is_dir, size)`.
pub fn resolve_path(path: &str) -> Option<(bool, u32)> {
    let backend = active_backend()?;
    if backend.is_dir(path) {
        return Some((true, 0));
    }
    match backend.get_file_size(path) {
        Ok(sz) => Some((false, sz)),
        Err(_) => None,
    }
}

/// Lê um arquivo inteiro. Tenta até 3 vezes para tolerar soluços
/// transitórios do cache/dispositivo.
pub fn read_file_all(path: &str) -> Result<Vec<u8>, i32> {
    let backend = match active_backend() {
        Some(b) => b,
        None => return Err(FsError::Unsupported.code()),
    };

    for _attempt in 0..3 {
        let size = match backend.get_file_size(path) {
            Ok(s) => s,
            Err(_) => continue,
        };
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; size as usize];
        match backend.read_file(path, &mut buf) {
            Ok(read) => {
                buf.truncate(read);
                return Ok(buf);
            }
            Err(_) => continue,
        }
    }

    Err(FsError::IoError.code())
}
