//! Drivers de hardware.

pub mod ata;
pub mod keyboard;
pub mod pic;
pub mod serial;
pub mod timer;
pub mod video;

/// Trait de dispositivo de bloco. O block cache e o FAT16 só conhecem
/// esta interface, o que permite testar a pilha de armazenamento com um
/// disco de RAM no host.
pub mod block {
    use alloc::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum BlockError {
        /// Bloco fora da capacidade do dispositivo
        InvalidBlock,
        /// Buffer menor que um bloco
        InvalidBuffer,
        /// Falha de I/O (timeout, erro do controlador)
        IoError,
        /// Dispositivo somente-leitura
        ReadOnly,
    }

    /// Dispositivo de blocos endereçado por setor.
    pub trait BlockDevice: Send + Sync {
        fn read_block(&self, block: u64, buf: &mut [u8]) -> Result<(), BlockError>;
        fn write_block(&self, block: u64, buf: &[u8]) -> Result<(), BlockError>;
        fn block_size(&self) -> usize;
        fn total_blocks(&self) -> u64;
    }

    /// Disco em RAM para testes e imagens sintéticas.
    pub struct RamDisk {
        sectors: crate::sync::Spinlock<Vec<u8>>,
        sector_size: usize,
    }

    impl RamDisk {
        pub fn new(total_sectors: u64, sector_size: usize) -> Self {
            Self {
                sectors: crate::sync::Spinlock::new(
                    alloc::vec![0u8; total_sectors as usize * sector_size],
                ),
                sector_size,
            }
        }

        /// Cria um RamDisk com conteúdo inicial (imagem crua).
        pub fn from_image(image: &[u8], sector_size: usize) -> Self {
            let mut data = image.to_vec();
            let rem = data.len() % sector_size;
            if rem != 0 {
                data.resize(data.len() + sector_size - rem, 0);
            }
            Self {
                sectors: crate::sync::Spinlock::new(data),
                sector_size,
            }
        }
    }

    impl BlockDevice for RamDisk {
        fn read_block(&self, block: u64, buf: &mut [u8]) -> Result<(), BlockError> {
            if buf.len() < self.sector_size {
                return Err(BlockError::InvalidBuffer);
            }
            let data = self.sectors.lock();
            let off = block as usize * self.sector_size;
            if off + self.sector_size > data.len() {
                return Err(BlockError::InvalidBlock);
            }
            buf[..self.sector_size].copy_from_slice(&data[off..off + self.sector_size]);
            Ok(())
        }

        fn write_block(&self, block: u64, buf: &[u8]) -> Result<(), BlockError> {
            if buf.len() < self.sector_size {
                return Err(BlockError::InvalidBuffer);
            }
            let mut data = self.sectors.lock();
            let off = block as usize * self.sector_size;
            if off + self.sector_size > data.len() {
                return Err(BlockError::InvalidBlock);
            }
            data[off..off + self.sector_size].copy_from_slice(&buf[..self.sector_size]);
            Ok(())
        }

        fn block_size(&self) -> usize {
            self.sector_size
        }

        fn total_blocks(&self) -> u64 {
            (self.sectors.lock().len() / self.sector_size) as u64
        }
    }
}
