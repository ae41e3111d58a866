//! Loader ELF64 — materializa tasks de usuário a partir do VFS.
//!
//! Procedimento: ler o arquivo inteiro (com retry do VFS), validar o
//! cabeçalho (`\x7FELF`, 64-bit, little-endian, ET_EXEC, EM_X86_64),
//! criar a task de usuário (que já traz PML4 própria e stack mapeada) e
//! materializar cada segmento `PT_LOAD` página a página: frame novo,
//! zerado, até `p_filesz` bytes copiados do offset certo do arquivo, e
//! o mapeamento `PRESENT|USER` (+`RW` se `PF_W`) na PML4 da task.

#![allow(non_camel_case_types)]

use crate::fs::vfs;
use crate::mm::config::FRAME_SIZE;
use crate::mm::paging::{self, MapFlags};
use crate::mm::pmm;
use crate::sched::task::{self, TaskState, Tid, TASKS};
use alloc::vec::Vec;

pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
pub const ELF_CLASS_64: u8 = 2;
pub const ELF_DATA_LSB: u8 = 1;

/// Arquivo executável
pub const ET_EXEC: u16 = 2;
/// x86-64
pub const EM_X86_64: u16 = 0x3E;

/// Segmento carregável
pub const PT_LOAD: u32 = 1;

pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

/// Cabeçalho ELF64
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Elf64_Ehdr {
    pub e_ident: [u8; 16],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// Program Header ELF64
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Elf64_Phdr {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    NotFound,
    InvalidFormat,
    OutOfMemory,
}

/// Valida o cabeçalho contra o que este kernel executa.
pub fn validate_header(h: &Elf64_Ehdr) -> Result<(), ExecError> {
    if h.e_ident[0..4] != ELF_MAGIC {
        crate::kwarn!("(ELF) magic inválido");
        return Err(ExecError::InvalidFormat);
    }
    if h.e_ident[4] != ELF_CLASS_64 {
        crate::kwarn!("(ELF) não é 64-bit");
        return Err(ExecError::InvalidFormat);
    }
    if h.e_ident[5] != ELF_DATA_LSB {
        crate::kwarn!("(ELF) não é little-endian");
        return Err(ExecError::InvalidFormat);
    }
    if h.e_type != ET_EXEC {
        crate::kwarn!("(ELF) não é ET_EXEC (PIE não suportado)");
        return Err(ExecError::InvalidFormat);
    }
    if h.e_machine != EM_X86_64 {
        crate::kwarn!("(ELF) não é x86-64");
        return Err(ExecError::InvalidFormat);
    }
    Ok(())
}

/// Lê o Ehdr de um buffer (sem exigir alinhamento).
pub fn parse_header(data: &[u8]) -> Result<Elf64_Ehdr, ExecError> {
    if data.len() < core::mem::size_of::<Elf64_Ehdr>() {
        return Err(ExecError::InvalidFormat);
    }
    // SAFETY: tamanho verificado; read_unaligned tolera o buffer de Vec
    let h = unsafe { core::ptr::read_unaligned(data.as_ptr() as *const Elf64_Ehdr) };
    validate_header(&h)?;
    Ok(h)
}

fn parse_phdr(data: &[u8], ehdr: &Elf64_Ehdr, index: u16) -> Result<Elf64_Phdr, ExecError> {
    let off = ehdr.e_phoff as usize + index as usize * ehdr.e_phentsize as usize;
    if (ehdr.e_phentsize as usize) < core::mem::size_of::<Elf64_Phdr>()
        || (off + core::mem::size_of::<Elf64_Phdr>()) > data.len()
    {
        return Err(ExecError::InvalidFormat);
    }
    // SAFETY: faixa verificada acima
    Ok(unsafe { core::ptr::read_unaligned(data.as_ptr().add(off) as *const Elf64_Phdr) })
}

/// Materializa um segmento PT_LOAD na PML4 da task.
fn load_segment(data: &[u8], ph: &Elf64_Phdr, pml4_phys: u64) -> Result<(), ExecError> {
    if ph.p_type != PT_LOAD {
        return Ok(());
    }
    if ph.p_offset as usize + ph.p_filesz as usize > data.len() {
        return Err(ExecError::InvalidFormat);
    }

    let vaddr_base = ph.p_vaddr & !(FRAME_SIZE - 1);
    let vaddr_offset = ph.p_vaddr & (FRAME_SIZE - 1);
    let total = vaddr_offset + ph.p_memsz;
    let pages = (total + FRAME_SIZE - 1) / FRAME_SIZE;

    let mut flags = MapFlags::PRESENT | MapFlags::USER;
    if ph.p_flags & PF_W != 0 {
        flags |= MapFlags::WRITABLE;
    }

    let mut copied: u64 = 0;
    for i in 0..pages {
        let frame = pmm::alloc_frame().ok_or(ExecError::OutOfMemory)?;
        let phys = frame.as_u64();

        // zerar e preencher pela janela identity
        // SAFETY: frame recém-alocado, identity-mapped, exclusivo
        unsafe {
            core::ptr::write_bytes(phys as *mut u8, 0, FRAME_SIZE as usize);
        }

        if ph.p_filesz > 0 && copied < ph.p_filesz {
            let page_off = if i == 0 { vaddr_offset } else { 0 };
            let space = FRAME_SIZE - page_off;
            let remaining = ph.p_filesz - copied;
            let chunk = remaining.min(space);

            let src = ph.p_offset + copied;
            // SAFETY: faixas verificadas; destino é o frame zerado acima
            unsafe {
                core::ptr::copy_nonoverlapping(
                    data.as_ptr().add(src as usize),
                    (phys + page_off) as *mut u8,
                    chunk as usize,
                );
            }
            copied += chunk;
        }

        let vaddr = vaddr_base + i * FRAME_SIZE;
        paging::map_page_64(pml4_phys, phys, vaddr, flags)
            .map_err(|_| ExecError::OutOfMemory)?;
    }

    Ok(())
}

fn elf_noop_entry() {
    // entry placeholder: o RIP real vem de e_entry
}

/// Carrega `path` numa task de usuário nova. Retorna o tid (a task fica
/// `Ready`, NÃO enfileirada) e o entry point.
fn load_task(path: &str) -> Result<(Tid, u64), ExecError> {
    let data: Vec<u8> = vfs::read_file_all(path).map_err(|_| ExecError::NotFound)?;
    let ehdr = parse_header(&data)?;

    let tid = task::task_create(elf_noop_entry, path, false).ok_or(ExecError::OutOfMemory)?;

    let pml4 = {
        let table = TASKS.lock();
        match table.get(tid) {
            Some(t) => t.pml4_phys,
            None => return Err(ExecError::OutOfMemory),
        }
    };

    for i in 0..ehdr.e_phnum {
        let ph = parse_phdr(&data, &ehdr, i)?;
        if let Err(e) = load_segment(&data, &ph, pml4) {
            // abortar limpo: a task nunca rodou, marcar morta
            let mut table = TASKS.lock();
            if let Some(t) = table.get_mut(tid) {
                t.state = TaskState::Dead;
            }
            crate::kerror!("(ELF) falha no segmento {} de '{}'", i, path);
            return Err(e);
        }
    }

    // entry real do binário estagiado para o trampolim de usermode
    {
        let mut table = TASKS.lock();
        if let Some(t) = table.get_mut(tid) {
            t.regs.r12 = ehdr.e_entry;
        }
    }

    crate::kinfo!("(ELF) '{}' carregado (tid={}, entry={:#x})", path, tid, ehdr.e_entry);
    Ok((tid, ehdr.e_entry))
}

/// Carrega e enfileira para escalonamento normal.
pub fn elf_spawn(path: &str) -> Result<Tid, ExecError> {
    let (tid, _entry) = load_task(path)?;
    super::scheduler::task_ready(tid);
    Ok(tid)
}

/// Caminho do comando `run`: carrega, troca imediatamente para a task
/// nova e só retorna quando ela terminar (o chamador roda nas frestas
/// do round-robin até lá).
pub fn elf_run(path: &str) -> Result<Tid, ExecError> {
    let (tid, _entry) = load_task(path)?;
    super::scheduler::switch_to(tid);

    loop {
        let done = {
            let table = TASKS.lock();
            match table.get(tid) {
                Some(t) => t.state == TaskState::Dead,
                None => true, // slot já recolhido
            }
        };
        if done {
            return Ok(tid);
        }
        super::scheduler::task_yield();
    }
}
