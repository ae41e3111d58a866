//! Physical Memory Manager (PMM) — alocador de frames por bitmap.
//!
//! A faixa física gerenciada é particionada em chunks de 1 MiB; cada
//! chunk carrega um bitmap de 1 bit por frame de 4 KiB (0 = livre,
//! 1 = em uso). Os chunks são criados preguiçosamente no primeiro toque,
//! então a memória de metadados cresce com o uso real e não com o
//! tamanho da RAM.
//!
//! Invariante central: um frame está em uso se e somente se o seu bit
//! está setado. `alloc_frame` faz a transição 0->1 sob o lock;
//! `free_frame` limpa o bit de forma idempotente.
//!
//! Este módulo nunca entra em panic: exaustão retorna `None` e cabe ao
//! chamador decidir se é fatal.

use crate::mm::addr::PhysAddr;
use crate::mm::config::FRAME_SIZE;
use crate::sync::Spinlock;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;

/// Tamanho de um chunk (1 MiB).
const CHUNK_SIZE: u64 = 1 << 20;

/// Frames por chunk (256).
const FRAMES_PER_CHUNK: u64 = CHUNK_SIZE / FRAME_SIZE;

/// Palavras de 32 bits por chunk (8).
const WORDS_PER_CHUNK: usize = (FRAMES_PER_CHUNK as usize) / 32;

/// Bitmap de um chunk de 1 MiB.
struct ChunkBitmap {
    words: [u32; WORDS_PER_CHUNK],
}

impl ChunkBitmap {
    fn new() -> Self {
        Self {
            words: [0; WORDS_PER_CHUNK],
        }
    }

    #[inline]
    fn test(&self, local: u64) -> bool {
        (self.words[(local / 32) as usize] >> (local % 32)) & 1 != 0
    }

    #[inline]
    fn set(&mut self, local: u64) {
        self.words[(local / 32) as usize] |= 1 << (local % 32);
    }

    #[inline]
    fn clear(&mut self, local: u64) {
        self.words[(local / 32) as usize] &= !(1 << (local % 32));
    }
}

/// Alocador de frames físicos.
pub struct FrameBitmap {
    /// Primeiro frame gerenciado.
    start_frame: u64,
    /// Quantidade de frames gerenciados.
    frames: u64,
    /// Chunks criados (índice de chunk -> bitmap).
    chunks: BTreeMap<u64, Box<ChunkBitmap>>,
}

impl FrameBitmap {
    pub const fn new() -> Self {
        Self {
            start_frame: 0,
            frames: 0,
            chunks: BTreeMap::new(),
        }
    }

    /// Inicializa a faixa gerenciada `[start, end)` (endereços físicos).
    pub fn init(&mut self, start: u64, end: u64) {
        if end <= start {
            return;
        }
        self.start_frame = start / FRAME_SIZE;
        let end_frame = (end + FRAME_SIZE - 1) / FRAME_SIZE;
        self.frames = end_frame - self.start_frame;
        self.chunks.clear();
    }

    fn max_chunks(&self) -> u64 {
        (self.frames + FRAMES_PER_CHUNK - 1) / FRAMES_PER_CHUNK
    }

    /// Obtém (criando preguiçosamente) o chunk de índice `chi`.
    /// Retorna `None` se a criação falhar (heap esgotado) — melhor
    /// esforço, como manda a semântica de "nunca panica".
    fn chunk_mut(&mut self, chi: u64) -> Option<&mut ChunkBitmap> {
        if !self.chunks.contains_key(&chi) {
            // No kernel os metadados vêm do heap; sem espaço lá, o chunk
            // fica sem criar e o scan segue adiante. (No host de teste o
            // allocator é o da std.)
            #[cfg(not(test))]
            if !crate::mm::heap::has_space(core::mem::size_of::<ChunkBitmap>() as u32 + 64) {
                return None;
            }
            self.chunks.insert(chi, Box::new(ChunkBitmap::new()));
        }
        self.chunks.get_mut(&chi).map(|b| b.as_mut())
    }

    /// Aloca o frame livre de MENOR endereço físico.
    pub fn alloc_frame(&mut self) -> Option<PhysAddr> {
        if self.frames == 0 {
            return None;
        }

        for chi in 0..self.max_chunks() {
            let start_frame = self.start_frame;
            let frames = self.frames;
            let chunk = match self.chunk_mut(chi) {
                Some(c) => c,
                None => continue,
            };

            for w in 0..WORDS_PER_CHUNK {
                if chunk.words[w] == u32::MAX {
                    continue; // palavra cheia
                }
                for b in 0..32u64 {
                    let local = (w as u64) * 32 + b;
                    if local >= FRAMES_PER_CHUNK {
                        break;
                    }
                    if !chunk.test(local) {
                        let idx = chi * FRAMES_PER_CHUNK + local;
                        if idx >= frames {
                            // fora da faixa gerenciada (último chunk parcial)
                            return None;
                        }
                        chunk.set(local);
                        let frame_no = start_frame + idx;
                        return Some(PhysAddr::new(frame_no * FRAME_SIZE));
                    }
                }
            }
        }

        None
    }

    /// Libera um frame. Endereço desalinhado é logado e descartado;
    /// fora da faixa é ignorado; limpar um bit já limpo é no-op.
    pub fn free_frame(&mut self, addr: PhysAddr) {
        let a = addr.as_u64();
        if a % FRAME_SIZE != 0 {
            crate::kwarn!("(PMM) free_frame desalinhado: {:#x}", a);
            return;
        }

        let frame_no = a / FRAME_SIZE;
        if frame_no < self.start_frame {
            return;
        }
        let idx = frame_no - self.start_frame;
        if idx >= self.frames {
            return;
        }

        let chi = idx / FRAMES_PER_CHUNK;
        let local = idx % FRAMES_PER_CHUNK;
        if let Some(chunk) = self.chunks.get_mut(&chi) {
            chunk.clear(local);
        }
    }

    /// Reserva (marca como em uso) todos os frames que tocam `[start, end)`.
    /// Idempotente; cria chunks preguiçosamente.
    pub fn reserve(&mut self, start: u64, end: u64) {
        if self.frames == 0 || end <= start {
            return;
        }

        let start_frame = start / FRAME_SIZE;
        let end_frame = (end + FRAME_SIZE - 1) / FRAME_SIZE;

        if end_frame <= self.start_frame {
            return;
        }
        if start_frame >= self.start_frame + self.frames {
            return;
        }

        let s = start_frame.saturating_sub(self.start_frame);
        let e = core::cmp::min(end_frame - self.start_frame, self.frames);

        for idx in s..e {
            let chi = idx / FRAMES_PER_CHUNK;
            let local = idx % FRAMES_PER_CHUNK;
            match self.chunk_mut(chi) {
                Some(c) => c.set(local),
                None => continue, // melhor esforço
            }
        }
    }

    /// Quantidade de frames gerenciados.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Quantidade de bits setados (frames em uso) — para estatísticas e
    /// verificação da bijeção alocação<->bit.
    pub fn set_bits(&self) -> u64 {
        let mut count = 0u64;
        for (chi, chunk) in self.chunks.iter() {
            for local in 0..FRAMES_PER_CHUNK {
                let idx = chi * FRAMES_PER_CHUNK + local;
                if idx >= self.frames {
                    break;
                }
                if chunk.test(local) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Existe uma sequência de `need` frames livres consecutivos?
    pub fn has_contiguous(&mut self, need: u64) -> bool {
        if need == 0 || self.frames == 0 {
            return false;
        }
        let mut run = 0u64;
        for idx in 0..self.frames {
            let chi = idx / FRAMES_PER_CHUNK;
            let local = idx % FRAMES_PER_CHUNK;
            let used = match self.chunks.get(&chi) {
                Some(c) => c.test(local),
                None => false, // chunk nunca tocado = tudo livre
            };
            if used {
                run = 0;
            } else {
                run += 1;
                if run >= need {
                    return true;
                }
            }
        }
        false
    }
}

/// Instância global do alocador (IRQ-off + flag, ver Spinlock).
pub static FRAME_ALLOCATOR: Spinlock<FrameBitmap> = Spinlock::new(FrameBitmap::new());

/// Inicializa o PMM para a faixa física `[start, end)`.
pub fn init(start: u64, end: u64) {
    FRAME_ALLOCATOR.lock().init(start, end);
    crate::kinfo!(
        "(PMM) faixa {:#x}..{:#x} ({} frames)",
        start,
        end,
        FRAME_ALLOCATOR.lock().frames()
    );
}

/// Aloca um frame de 4 KiB.
pub fn alloc_frame() -> Option<PhysAddr> {
    FRAME_ALLOCATOR.lock().alloc_frame()
}

/// Libera um frame.
pub fn free_frame(addr: PhysAddr) {
    FRAME_ALLOCATOR.lock().free_frame(addr)
}

/// Reserva a faixa `[start, end)`.
pub fn reserve(start: u64, end: u64) {
    FRAME_ALLOCATOR.lock().reserve(start, end)
}

/// Frames gerenciados.
pub fn frames() -> u64 {
    FRAME_ALLOCATOR.lock().frames()
}

/// Frames em uso.
pub fn used_frames() -> u64 {
    FRAME_ALLOCATOR.lock().set_bits()
}
