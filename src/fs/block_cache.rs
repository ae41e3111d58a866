//! Block cache LRU sobre o dispositivo de setores.
//!
//! Entradas de tamanho fixo; o LRU é decidido por um timestamp lógico
//! monotônico atualizado a cada acesso. Invariantes:
//!
//! - `data` de uma entrada válida é a imagem comprometida do bloco,
//!   exceto quando `dirty`;
//! - a evicção escreve blocos sujos de volta antes de reusar o slot;
//! - slots inválidos são preferidos como vítima.
//!
//! Sem read-ahead.

use crate::drivers::block::{BlockDevice, BlockError};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

struct CacheEntry {
    block_num: u64,
    last_used: u64,
    valid: bool,
    dirty: bool,
    data: Vec<u8>,
}

pub struct BlockCache {
    device: Arc<dyn BlockDevice>,
    block_size: usize,
    entries: Vec<CacheEntry>,
    timestamp: u64,
    hits: u64,
    misses: u64,
}

impl BlockCache {
    /// Cria o cache. `block_size` precisa ser múltiplo (>= 1x) do setor
    /// do dispositivo.
    pub fn new(
        device: Arc<dyn BlockDevice>,
        block_size: usize,
        num_entries: usize,
    ) -> Result<Self, BlockError> {
        let sector = device.block_size();
        if block_size < sector || block_size % sector != 0 || num_entries == 0 {
            return Err(BlockError::InvalidBuffer);
        }

        let mut entries = Vec::with_capacity(num_entries);
        for _ in 0..num_entries {
            entries.push(CacheEntry {
                block_num: 0,
                last_used: 0,
                valid: false,
                dirty: false,
                data: vec![0u8; block_size],
            });
        }

        Ok(Self {
            device,
            block_size,
            entries,
            timestamp: 0,
            hits: 0,
            misses: 0,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Estatísticas (hits, misses).
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    fn sectors_per_block(&self) -> u64 {
        (self.block_size / self.device.block_size()) as u64
    }

    fn read_from_device(&self, block_num: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        let spb = self.sectors_per_block();
        let sector_size = self.device.block_size();
        let start = block_num * spb;
        for s in 0..spb {
            let off = s as usize * sector_size;
            self.device
                .read_block(start + s, &mut buf[off..off + sector_size])?;
        }
        Ok(())
    }

    fn write_to_device(&self, block_num: u64, buf: &[u8]) -> Result<(), BlockError> {
        let spb = self.sectors_per_block();
        let sector_size = self.device.block_size();
        let start = block_num * spb;
        for s in 0..spb {
            let off = s as usize * sector_size;
            self.device
                .write_block(start + s, &buf[off..off + sector_size])?;
        }
        Ok(())
    }

    /// Índice da vítima: primeiro slot inválido, senão o menor
    /// `last_used`.
    fn victim_index(&self) -> usize {
        let mut lru = 0usize;
        let mut oldest = u64::MAX;
        for (i, e) in self.entries.iter().enumerate() {
            if !e.valid {
                return i;
            }
            if e.last_used < oldest {
                oldest = e.last_used;
                lru = i;
            }
        }
        lru
    }

    /// Escreve a vítima de volta se necessário e devolve o slot limpo.
    fn evict(&mut self, idx: usize) -> Result<(), BlockError> {
        let (valid, dirty, block_num) = {
            let e = &self.entries[idx];
            (e.valid, e.dirty, e.block_num)
        };
        if valid && dirty {
            let data = core::mem::take(&mut self.entries[idx].data);
            let r = self.write_to_device(block_num, &data);
            self.entries[idx].data = data;
            r?;
            self.entries[idx].dirty = false;
        }
        Ok(())
    }

    /// Lê o bloco `block_num` para `buf`.
    pub fn read(&mut self, block_num: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        if buf.len() < self.block_size {
            return Err(BlockError::InvalidBuffer);
        }
        self.timestamp += 1;

        // hit?
        for e in self.entries.iter_mut() {
            if e.valid && e.block_num == block_num {
                self.hits += 1;
                e.last_used = self.timestamp;
                buf[..self.block_size].copy_from_slice(&e.data);
                return Ok(());
            }
        }

        // miss: escolher vítima, evictar e preencher do dispositivo
        self.misses += 1;
        let idx = self.victim_index();
        self.evict(idx)?;

        let mut data = core::mem::take(&mut self.entries[idx].data);
        let r = self.read_from_device(block_num, &mut data);
        self.entries[idx].data = data;
        if let Err(e) = r {
            self.entries[idx].valid = false;
            crate::kwarn!("(BlockCache) leitura do bloco {} falhou", block_num);
            return Err(e);
        }

        let ts = self.timestamp;
        let e = &mut self.entries[idx];
        e.block_num = block_num;
        e.last_used = ts;
        e.valid = true;
        e.dirty = false;
        buf[..self.block_size].copy_from_slice(&e.data);
        Ok(())
    }

    /// Escreve `buf` no bloco `block_num` (write-back: só marca dirty).
    pub fn write(&mut self, block_num: u64, buf: &[u8]) -> Result<(), BlockError> {
        if buf.len() < self.block_size {
            return Err(BlockError::InvalidBuffer);
        }
        self.timestamp += 1;

        // hit: atualizar payload
        for e in self.entries.iter_mut() {
            if e.valid && e.block_num == block_num {
                e.data.copy_from_slice(&buf[..self.block_size]);
                e.last_used = self.timestamp;
                e.dirty = true;
                return Ok(());
            }
        }

        // miss: vítima + overwrite completo (sem ler do dispositivo:
        // o bloco inteiro será sobrescrito)
        let idx = self.victim_index();
        self.evict(idx)?;

        let ts = self.timestamp;
        let e = &mut self.entries[idx];
        e.data.copy_from_slice(&buf[..self.block_size]);
        e.block_num = block_num;
        e.last_used = ts;
        e.valid = true;
        e.dirty = true;
        Ok(())
    }

    /// Escreve de volta toda entrada válida e suja.
    pub fn flush(&mut self) -> Result<(), BlockError> {
        for i in 0..self.entries.len() {
            let (valid, dirty, block_num) = {
                let e = &self.entries[i];
                (e.valid, e.dirty, e.block_num)
            };
            if valid && dirty {
                let data = core::mem::take(&mut self.entries[i].data);
                let r = self.write_to_device(block_num, &data);
                self.entries[i].data = data;
                r?;
                self.entries[i].dirty = false;
            }
        }
        Ok(())
    }

    /// Loga as estatísticas do cache.
    pub fn print_stats(&self) {
        let total = self.hits + self.misses;
        let rate = if total > 0 { self.hits * 100 / total } else { 0 };
        crate::kprintln!(
            "Block cache: {} x {} bytes, {} hits, {} misses ({}%)",
            self.entries.len(),
            self.block_size,
            self.hits,
            self.misses,
            rate
        );
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        // destroy: garantir que nada sujo se perca
        let _ = self.flush();
    }
}
